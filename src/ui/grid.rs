// Image grid inside the review panel
// One fixed-size cell per image of the live batch, laid out from a LayoutResult.

use gdk4::Texture;
use gtk4::prelude::*;
use gtk4::{
    Align, ContentFit, GestureClick, Grid, Label, Overlay, Picture, PolicyType, ScrolledWindow,
    Widget,
};
use std::cell::RefCell;
use std::rc::Rc;

use crate::layout::LayoutResult;
use crate::review::SelectionState;

/// Gap between cells in pixels
pub const CELL_SPACING: i32 = 8;
/// Widest cell border (the dashed `selected` one), both sides together
pub const CELL_FRAME: i32 = 4;

type IndexCallback = Rc<dyn Fn(usize)>;

struct GridCell {
    overlay: Overlay,
    picture: Picture,
}

pub struct ImageGrid {
    scroller: ScrolledWindow,
    grid: Grid,
    cells: RefCell<Vec<GridCell>>,
    on_toggle: Rc<RefCell<Option<IndexCallback>>>,
    on_expand: Rc<RefCell<Option<IndexCallback>>>,
}

impl ImageGrid {
    pub fn new() -> Rc<Self> {
        let grid = Grid::new();
        grid.set_row_spacing(CELL_SPACING as u32);
        grid.set_column_spacing(CELL_SPACING as u32);
        grid.set_halign(Align::Center);
        grid.set_valign(Align::Center);
        grid.add_css_class("nf-image-grid");

        let scroller = ScrolledWindow::builder()
            .hscrollbar_policy(PolicyType::Never)
            .vscrollbar_policy(PolicyType::Automatic)
            .hexpand(true)
            .vexpand(true)
            .child(&grid)
            .build();

        Rc::new(Self {
            scroller,
            grid,
            cells: RefCell::new(Vec::new()),
            on_toggle: Rc::new(RefCell::new(None)),
            on_expand: Rc::new(RefCell::new(None)),
        })
    }

    pub fn widget(&self) -> Widget {
        self.scroller.clone().upcast()
    }

    /// Single click on a cell
    pub fn connect_toggle<F: Fn(usize) + 'static>(&self, callback: F) {
        *self.on_toggle.borrow_mut() = Some(Rc::new(callback));
    }

    /// Double click on a cell
    pub fn connect_expand<F: Fn(usize) + 'static>(&self, callback: F) {
        *self.on_expand.borrow_mut() = Some(Rc::new(callback));
    }

    /// Drop every cell.
    pub fn clear(&self) {
        for cell in self.cells.borrow_mut().drain(..) {
            if cell.overlay.parent().is_some() {
                self.grid.remove(&cell.overlay);
            }
        }
    }

    /// Replace the cells with `count` empty ones.
    pub fn rebuild(&self, count: usize) {
        self.clear();
        let cells: Vec<GridCell> = (0..count).map(|index| self.create_cell(index)).collect();
        *self.cells.borrow_mut() = cells;
    }

    fn create_cell(&self, index: usize) -> GridCell {
        let picture = Picture::new();
        picture.set_can_shrink(true);
        picture.set_content_fit(ContentFit::Contain);
        picture.add_css_class("nf-image");

        let overlay = Overlay::new();
        overlay.set_child(Some(&picture));
        overlay.add_css_class("nf-image-container");

        let badge = Label::new(Some(&(index + 1).to_string()));
        badge.set_halign(Align::Start);
        badge.set_valign(Align::Start);
        badge.add_css_class("nf-image-overlay");
        overlay.add_overlay(&badge);

        // The second press of a double click first undoes the toggle from
        // the first press, so a double click leaves the selection unchanged.
        let on_toggle = self.on_toggle.clone();
        let on_expand = self.on_expand.clone();
        let click = GestureClick::new();
        click.set_button(1);
        click.connect_pressed(move |_, n_press, _x, _y| {
            let toggle = on_toggle.borrow().clone();
            match n_press {
                1 => {
                    if let Some(callback) = toggle {
                        callback(index);
                    }
                }
                2 => {
                    if let Some(callback) = toggle {
                        callback(index);
                    }
                    let expand = on_expand.borrow().clone();
                    if let Some(callback) = expand {
                        callback(index);
                    }
                }
                _ => {}
            }
        });
        overlay.add_controller(click);

        GridCell { overlay, picture }
    }

    pub fn set_texture(&self, index: usize, texture: &Texture) {
        if let Some(cell) = self.cells.borrow().get(index) {
            cell.picture.set_paintable(Some(texture));
        }
    }

    /// Place cells row-major with `layout.cols` columns, each sized to the cell.
    pub fn apply_layout(&self, layout: LayoutResult) {
        let cols = layout.cols.max(1) as usize;
        for (index, cell) in self.cells.borrow().iter().enumerate() {
            if cell.overlay.parent().is_some() {
                self.grid.remove(&cell.overlay);
            }
            cell.overlay
                .set_size_request(layout.cell_width as i32, layout.cell_height as i32);
            self.grid.attach(
                &cell.overlay,
                (index % cols) as i32,
                (index / cols) as i32,
                1,
                1,
            );
        }
    }

    /// Mirror the selection onto the cells' `selected` class.
    pub fn sync_selection(&self, selection: &SelectionState) {
        for (index, cell) in self.cells.borrow().iter().enumerate() {
            if selection.contains(index) {
                cell.overlay.add_css_class("selected");
            } else {
                cell.overlay.remove_css_class("selected");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.cells.borrow().len()
    }
}

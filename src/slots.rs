use crate::{
    config::{TouchConfig, MAX_FINGERS},
    protocol::RecordStatus,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TouchSlot {
    pub x: u16,
    pub y: u16,
    pub major: u8,
    pub minor: u8,
    pub pressure: u8,
    pub palm: bool,
    pub status: Option<RecordStatus>,
    pub prev_type: u8,
    pub touched: bool,
    pub move_count: u16,
    pub press_x: u16,
    pub press_y: u16,
    pub last_x: u16,
    pub last_y: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotTable {
    pub slots: [TouchSlot; MAX_FINGERS],
    pub pressed: u8,
    pub check_multi: bool,
    pub touch_key_down: bool,
    pub all_finger_count: u32,
    pub all_multi_finger_count: u32,
    pub noise: u8,
}

impl Default for SlotTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotTable {
    pub const fn new() -> Self {
        Self {
            slots: [TouchSlot {
                x: 0,
                y: 0,
                major: 0,
                minor: 0,
                pressure: 0,
                palm: false,
                status: None,
                prev_type: 0,
                touched: false,
                move_count: 0,
                press_x: 0,
                press_y: 0,
                last_x: 0,
                last_y: 0,
            }; MAX_FINGERS],
            pressed: 0,
            check_multi: false,
            touch_key_down: false,
            all_finger_count: 0,
            all_multi_finger_count: 0,
            noise: 0,
        }
    }

    pub fn touched(&self, slot: usize) -> bool {
        self.slots.get(slot).is_some_and(|slot| slot.touched)
    }

    pub fn touched_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.touched).count()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnZone {
    Edge,
    Center,
    FarEdge,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowZone {
    StatusBar,
    Center,
    NavBar,
}

/// Coarse screen region of a contact, used for diagnostics only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Location {
    pub column: ColumnZone,
    pub row: RowZone,
}

impl Location {
    pub fn detect(config: &TouchConfig, x: u16, y: u16) -> Self {
        let column = if x < config.area_edge {
            ColumnZone::Edge
        } else if x < config.panel_width.saturating_sub(config.area_edge) {
            ColumnZone::Center
        } else {
            ColumnZone::FarEdge
        };
        let row = if y < config.area_indicator {
            RowZone::StatusBar
        } else if y < config.panel_height.saturating_sub(config.area_navigation) {
            RowZone::Center
        } else {
            RowZone::NavBar
        };
        Self { column, row }
    }

    pub const fn code(self) -> &'static str {
        match (self.column, self.row) {
            (ColumnZone::Edge, RowZone::StatusBar) => "E.S",
            (ColumnZone::Edge, RowZone::Center) => "E.C",
            (ColumnZone::Edge, RowZone::NavBar) => "E.N",
            (ColumnZone::Center, RowZone::StatusBar) => "C.S",
            (ColumnZone::Center, RowZone::Center) => "C.C",
            (ColumnZone::Center, RowZone::NavBar) => "C.N",
            (ColumnZone::FarEdge, RowZone::StatusBar) => "e.S",
            (ColumnZone::FarEdge, RowZone::Center) => "e.C",
            (ColumnZone::FarEdge, RowZone::NavBar) => "e.N",
        }
    }
}

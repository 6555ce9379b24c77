pub mod chart;
pub mod controls;
pub mod debug;
pub mod sidebar;
pub mod text_input;

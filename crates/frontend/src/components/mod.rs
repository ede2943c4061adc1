pub mod help_overlay;
pub mod map_view;
pub mod pin_panel;

pub mod map_list;
pub mod map_page;

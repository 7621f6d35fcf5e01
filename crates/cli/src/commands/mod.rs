pub mod update_stores;
pub mod work;

pub mod client;
pub mod import_state {
    pub mod model;
    pub mod store;
}

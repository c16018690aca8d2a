pub mod inventory_history;
pub mod products;
pub mod sale_items;
pub mod sales;
pub mod sessions;
pub mod users;

pub use inventory_history::Entity as InventoryHistory;
pub use products::Entity as Products;
pub use sale_items::Entity as SaleItems;
pub use sales::Entity as Sales;
pub use sessions::Entity as Sessions;
pub use users::Entity as Users;

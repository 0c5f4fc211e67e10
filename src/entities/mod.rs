pub mod inventory_item;
pub mod inventory_movement;
pub mod product;
pub mod warehouse;

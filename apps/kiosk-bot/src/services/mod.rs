pub mod restock_service;

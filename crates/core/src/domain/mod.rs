pub mod customer;
pub mod feedback;
pub mod menu;
pub mod order;
pub mod reservation;
pub mod venue;

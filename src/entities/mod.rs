pub mod conversion_rate;
pub mod inventory_record;
pub mod stock_reservation;

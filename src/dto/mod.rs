pub mod admin_dto;
pub mod listing_dto;

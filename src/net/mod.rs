pub mod checksum;
pub mod ip;
pub mod socket;
pub mod tcp;

pub mod cart_reader;
pub mod receipt_writer;

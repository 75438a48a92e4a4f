pub mod gpif_builder;
pub mod gpx_writer;
pub mod xml_writer;

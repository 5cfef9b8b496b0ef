pub mod trigger_reader;

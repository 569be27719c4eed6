pub mod ports;
pub mod etl_use_case;

pub mod tbc;

pub use tbc::TbcProvider;

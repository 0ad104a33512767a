pub mod bom;
pub mod datasheet;
pub mod results;
pub mod risk;

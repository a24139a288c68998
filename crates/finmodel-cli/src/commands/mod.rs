pub mod ndfl;
pub mod planned;
pub mod vat;

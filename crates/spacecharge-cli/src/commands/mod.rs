pub mod invert;
pub mod run;

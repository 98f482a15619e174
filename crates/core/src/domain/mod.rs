pub mod record;
pub mod run;

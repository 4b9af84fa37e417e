pub mod onboard_flag;
pub mod settings;

mod subscribe;
mod utils;
mod validate;

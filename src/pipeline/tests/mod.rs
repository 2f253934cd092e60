use super::*;

mod persist;
mod source;

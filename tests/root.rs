// All files containing tests
mod common;

mod lifetime;
mod recording;

//! The `datasets` command: built-in tag catalog.

use epoch_training::dataset;

pub fn run() {
    println!("{:<24} DESCRIPTION", "TAG");
    for (tag, description) in dataset::available() {
        println!("{tag:<24} {description}");
    }
}

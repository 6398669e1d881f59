//! diskimg CLI - convert, inspect and create VM disk images with qemu-img.

pub mod commands;

pub mod hd44780;

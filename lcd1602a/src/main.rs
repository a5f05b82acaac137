mod config;

use std::env::var;
use std::thread;
use std::time::Duration;
use dotenv::dotenv;
use log::{debug, info, warn};
use sysinfo::System;
use lcd1602a_gpio::gpiod::GpiodDriver;
use lcd1602a_gpio::lcd::hd44780::driver::{Lcd1602, PinAssignment};
use crate::config::Config;

/// Parses a list of line names separated by `,`, ` ` or `;`.
fn parse_pin_bus(pin_str: &str) -> Vec<&str> {
    pin_str
        .split([',', ' ', ';'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Builds the pin assignment from the `LCD1602A_*` environment variables.
fn pins_from_env() -> eyre::Result<PinAssignment> {
    let rs = var("LCD1602A_PIN_RS")?;
    let rw = var("LCD1602A_PIN_RW").ok().filter(|s| !s.trim().is_empty());
    let enable = var("LCD1602A_PIN_E")?;
    let data_str = var("LCD1602A_PINS_DATA")?;
    let data = parse_pin_bus(&data_str);

    let pins = match data.len() {
        4 => PinAssignment::new_4bit(
            &rs,
            rw.as_deref(),
            &enable,
            [data[0], data[1], data[2], data[3]],
        ),
        8 => PinAssignment::new_8bit(
            &rs,
            rw.as_deref(),
            &enable,
            [data[0], data[1], data[2], data[3], data[4], data[5], data[6], data[7]],
        ),
        n => eyre::bail!("Invalid number of data pins: {} (expected 4 or 8)", n),
    };
    Ok(pins)
}

fn main() -> eyre::Result<()> {
    // Initialize environment and logger
    dotenv().ok();
    pretty_env_logger::init();

    const UNKNOWN_STR: &str = "???";

    info!(
        "Hello, {}!",
        System::name().as_deref().unwrap_or(UNKNOWN_STR)
    );
    info!(
        "Hostname {}",
        System::host_name().as_deref().unwrap_or(UNKNOWN_STR)
    );

    let chip = var("LCD1602A_CHIP").unwrap_or_else(|_| "/dev/gpiochip0".to_string());
    let pins = pins_from_env()?;
    info!("LCD @ {} RS: {}, RW: {:?}, E: {}, Data: {:?}",
        chip, pins.rs, pins.rw, pins.enable, pins.data);

    let config = if let Some(config) = Config::try_load()? {
        info!("Config loaded from {}.", Config::path().display());
        config
    } else {
        info!("Config not found. Using default");
        let config = Config::default();
        config.save()?;
        info!("Default config saved.");
        config
    };
    debug!("{:?}", config);

    debug!("Initializing GPIO driver...");
    let gpio = GpiodDriver::open(&chip)?;
    debug!("{:?} initialized.", gpio);

    let mut lcd = Lcd1602::open(&gpio, &pins)?;
    lcd.begin(config.columns, config.rows, config.font())?;

    if config.tall_font && config.rows > 1 {
        warn!("The 5x10 font needs a single-line display, using 5x8");
    }
    for (slot, glyph) in config.glyphs.iter().enumerate() {
        lcd.create_char(slot as u8, glyph)?;
    }

    lcd.clear()?;
    lcd.print("Hello ")?;
    if config.glyphs.len() > 1 {
        lcd.write(1)?;
    }
    lcd.write(b',')?;
    lcd.set_cursor(0, 1)?;
    lcd.print("Rust on Linux!")?;
    if !config.glyphs.is_empty() {
        lcd.write(0)?;
    }

    info!("Greeting shown on {}x{} LCD.", lcd.columns(), lcd.lines());

    thread::sleep(Duration::from_secs(5));

    lcd.close()?;
    info!("LCD lines released.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pin_lists() {
        assert_eq!(parse_pin_bus("BCM21, BCM20;BCM16 BCM12"), ["BCM21", "BCM20", "BCM16", "BCM12"]);
        assert_eq!(parse_pin_bus(" 5 ,, 6 "), ["5", "6"]);
        assert!(parse_pin_bus("").is_empty());
    }
}

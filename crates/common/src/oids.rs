//! SNMP OIDs the agent reads from printers.
//!
//! Toner and serial OIDs come from the standard Printer MIB and vary in
//! practice across vendors; values that do not resolve on a given device are
//! simply absent from the probe result.

pub const SYS_DESCR: &str = "1.3.6.1.2.1.1.1.0";
pub const SYS_NAME: &str = "1.3.6.1.2.1.1.5.0";
pub const MODEL: &str = "1.3.6.1.2.1.25.3.2.1.3.1";
pub const SERIAL_NUMBER: &str = "1.3.6.1.2.1.43.5.1.1.17.1";

pub const PAGE_COUNT: &str = "1.3.6.1.2.1.43.10.2.1.4.1.1";
pub const PRINTER_STATUS: &str = "1.3.6.1.2.1.25.3.5.1.1.1";
pub const ERROR_STATE: &str = "1.3.6.1.2.1.25.3.5.1.2.1";

pub const TONER_BLACK: &str = "1.3.6.1.2.1.43.11.1.1.9.1.1";
pub const TONER_CYAN: &str = "1.3.6.1.2.1.43.11.1.1.9.1.2";
pub const TONER_MAGENTA: &str = "1.3.6.1.2.1.43.11.1.1.9.1.3";
pub const TONER_YELLOW: &str = "1.3.6.1.2.1.43.11.1.1.9.1.4";

/// Field-name-to-OID pairs for a device identity probe.
pub const IDENTITY_SET: &[(&str, &str)] = &[
    ("sys_descr", SYS_DESCR),
    ("name", SYS_NAME),
    ("model", MODEL),
    ("serial_number", SERIAL_NUMBER),
];

/// Field-name-to-OID pairs for a metrics probe.
pub const METRIC_SET: &[(&str, &str)] = &[
    ("page_count", PAGE_COUNT),
    ("status", PRINTER_STATUS),
    ("error_state", ERROR_STATE),
    ("toner_black", TONER_BLACK),
    ("toner_cyan", TONER_CYAN),
    ("toner_magenta", TONER_MAGENTA),
    ("toner_yellow", TONER_YELLOW),
];

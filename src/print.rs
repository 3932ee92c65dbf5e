//! `print!`/`println!` for kernel output. There is no VGA text-mode
//! console (Non-goal) — both macros write to the COM1 serial sink that
//! also backs [`crate::log`]'s logger, so early boot diagnostics and the
//! panic handler keep working before the logger is installed.

#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => ($crate::arch::x86::serial::_print(format_args!($($arg)*)));
}

#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ($crate::print!("{}\n", format_args!($($arg)*)));
}

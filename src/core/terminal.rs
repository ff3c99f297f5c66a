use console::{Emoji, style};

pub static SUCCESS_ICON: Emoji<'_, '_> = Emoji("✅ ", "");
pub static INFO_ICON: Emoji<'_, '_> = Emoji("ℹ️  ", "");
pub static WARN_ICON: Emoji<'_, '_> = Emoji("⚠️  ", "");
pub static ERROR_ICON: Emoji<'_, '_> = Emoji("❌ ", "");
pub static CLOCK: Emoji<'_, '_> = Emoji("⏰ ", "");
pub static GLOBE: Emoji<'_, '_> = Emoji("🌐 ", "");
pub static GEAR: Emoji<'_, '_> = Emoji("⚙️  ", "");

pub fn print_success(msg: &str) {
    println!("{} {}", SUCCESS_ICON, style(msg).green());
}

pub fn print_info(msg: &str) {
    println!("{} {}", INFO_ICON, style(msg).blue());
}

pub fn print_warn(msg: &str) {
    println!("{} {}", WARN_ICON, style(msg).yellow());
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", ERROR_ICON, style(msg).red().bold());
}

pub fn print_status(label: &str, msg: &str) {
    println!("  {} {}: {}", GEAR, style(label).bold().cyan(), msg);
}

pub fn print_link(label: &str, url: &str) {
    println!(
        "  {} {}: {}",
        GLOBE,
        style(label).bold(),
        style(url).underlined().cyan()
    );
}

/// One row of the `jobs` listing.
pub fn print_job(name: &str, cron: &str, description: &str) {
    println!(
        "  {} {:<24} {:<18} {}",
        CLOCK,
        style(name).bold().cyan(),
        style(cron).yellow(),
        style(description).dim()
    );
}

pub fn print_section(title: &str) {
    println!("\n {}", style(title).bold().underlined());
}

pub fn print_command(name: &str, help: &str) {
    println!("   {:<28} {}", style(name).green(), help);
}

pub fn print_banner() {
    println!();
    println!(
        " {} {}",
        style("dbnotify").bold().cyan(),
        style(env!("CARGO_PKG_VERSION")).dim()
    );
    println!(
        " {}\n",
        style("Scheduled database checks, delivered as notifications.").dim()
    );
}

pub fn print_goodbye() {
    println!("\n{}", style("dbnotify stopped.").bold().cyan());
}

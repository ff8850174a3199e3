use std::path::Path;

use console::Style;
use samired_core::combine::{Clipping, CombineParams};
use samired_core::pipeline::{ReductionConfig, RunSummary};

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }

    fn switch(&self, label: &str, on: bool) {
        let state = if on {
            self.method.apply_to("on")
        } else {
            self.disabled.apply_to("off")
        };
        println!("    {:<14}{}", self.label.apply_to(label), state);
    }
}

pub fn print_reduction_summary(config: &ReductionConfig, input: &Path) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to(format!("{} Data Reduction", config.instrument)));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(22)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Input"),
        s.path.apply_to(input.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(input.join(&config.reduced_dir).display())
    );
    println!();

    println!("  {}", s.header.apply_to("Object Corrections"));
    s.switch("Seam repair", config.stages.repair_seams);
    s.switch("Cosmic rays", config.stages.cosmic_rays);
    s.switch("Exposure time", config.stages.exposure_time);
    s.switch("Cleanup", config.clean_objects());
    match config.stages.glow_file {
        Some(ref glow) => println!(
            "    {:<14}{}",
            s.label.apply_to("Glow"),
            s.path.apply_to(glow.display())
        ),
        None => println!(
            "    {:<14}{}",
            s.label.apply_to("Glow"),
            s.disabled.apply_to("none")
        ),
    }
    println!();

    println!("  {}", s.header.apply_to("Cosmic Rays"));
    let cr = &config.cosmic_rays;
    println!(
        "    {:<14}{}",
        s.label.apply_to("Gain"),
        s.value.apply_to(format!("{} e/ADU", cr.gain))
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Read noise"),
        s.value.apply_to(format!("{} e", cr.read_noise))
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Sigma clip"),
        s.value.apply_to(cr.sigclip)
    );
    println!();

    println!("  {}", s.header.apply_to("Masters"));
    print_combine(&s, "Zero", &config.combine.zero);
    print_combine(&s, "Dark", &config.combine.dark);
    print_combine(&s, "Flat", &config.combine.flat);
    println!();
}

fn print_combine(s: &Styles, label: &str, params: &CombineParams) {
    let clipping = match params.clipping {
        Clipping::None => "no clipping".to_string(),
        Clipping::MinMax => "min/max clipping".to_string(),
        Clipping::Sigma(ref p) => format!("sigma clip {}/{}", p.low, p.high),
    };
    println!(
        "    {:<14}{} {}",
        s.label.apply_to(label),
        s.method.apply_to(format!("{:?}", params.method).to_lowercase()),
        s.value.apply_to(format!("({clipping})"))
    );
}

pub fn print_run_summary(summary: &RunSummary, reduced_dir: &Path) {
    let s = Styles::new();

    println!();
    println!("  {}", s.header.apply_to("Run Summary"));
    let rows = [
        ("Frames", summary.frames_found),
        ("Rejected", summary.frames_rejected),
        ("Reduced", summary.frames_reduced),
        ("Skipped", summary.frames_skipped),
        ("Failed", summary.frames_failed),
        ("Combined", summary.masters_combined),
        ("Reused", summary.masters_reused),
    ];
    for (label, value) in rows {
        println!(
            "    {:<14}{}",
            s.label.apply_to(label),
            s.value.apply_to(value)
        );
    }
    println!();
    println!("Output saved to {}", s.path.apply_to(reduced_dir.display()));
}

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// One chromatogram: `(retention time, sigma, amplitude)` peaks over a baseline.
fn generate_trace(
    times: &[f64],
    peaks: &[(f64, f64, f64)],
    noise_level: f64,
    rng: &mut SimpleRng,
) -> Vec<f64> {
    times
        .iter()
        .map(|&t| {
            let signal: f64 = peaks
                .iter()
                .map(|&(mu, sigma, amp)| gaussian(t, mu, sigma, amp))
                .sum();
            (signal + 50.0 + rng.gauss(0.0, noise_level)).max(0.0).round()
        })
        .collect()
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// `(precursor, product, retention time, amplitude)`; a zero precursor is a TIC.
const TRANSITIONS: &[(f64, f64, f64, f64)] = &[
    (0.0, 0.0, 2.4, 90_000.0),
    (195.1, 138.0, 2.4, 40_000.0),
    (195.1, 110.0, 2.4, 12_000.0),
    (181.1, 124.0, 3.1, 25_000.0),
    (181.1, 96.0, 3.1, 8_000.0),
];

fn shimadzu(times: &[f64], rng: &mut SimpleRng) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "[Header]\nApplication Name\tLabSolutions\nVersion\t5.97\n\n\
         [Sample Information]\nOperator\tdemo\nSample Name\tCaffeine 10 ppm\nSample ID\t7\n\n"
    );
    for (event, &(precursor, product, rt, amp)) in TRANSITIONS.iter().enumerate() {
        let kind = if precursor == 0.0 {
            "TIC".to_string()
        } else {
            format!("m/z {precursor:.2}>{product:.2}")
        };
        let _ = write!(
            out,
            "[MS Chromatogram]\nm/z 1-{}MS(E+) {kind}\nIntensity Units\tcounts\nR.Time (min)\tIntensity\n",
            event + 1
        );
        let ys = generate_trace(times, &[(rt, 0.05, amp)], amp * 0.01, rng);
        for (t, y) in times.iter().zip(ys) {
            let _ = writeln!(out, "{t:.3}\t{y}");
        }
        out.push('\n');
    }
    out
}

fn thermo(times: &[f64], rng: &mut SimpleRng) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "File Path,C:\\data\\blank03.cdf\nGenerated by,Chromeleon 7.2\n,\n\
         Injection Information:\nInjection,Blank 3\nInjection Number,12\n,\n"
    );
    let channels: &[(f64, f64)] = &[(1.8, 1_500.0), (2.9, 4_200.0)];
    for &(rt, amp) in channels {
        let _ = write!(out, "Chromatogram Data:\nInformation:\nTime (min),Step (s),Value (mAU)\n");
        let ys = generate_trace(times, &[(rt, 0.08, amp)], 2.0, rng);
        for (i, (t, y)) in times.iter().zip(ys).enumerate() {
            let step = if i == 0 { "n.a.".to_string() } else { "0.6".to_string() };
            let _ = writeln!(out, "{t:.3},{step},\"{}\"", thousands(y));
        }
        out.push_str(",\n");
    }
    out
}

fn waters(times: &[f64], rng: &mut SimpleRng) -> String {
    let mut out = String::new();
    let _ = write!(out, "Generated by,MassLynx 4.2\nname,QC high\nid,4\n\n");
    for &(precursor, product, rt, amp) in TRANSITIONS.iter().filter(|t| t.0 > 0.0) {
        let _ = write!(out, "precursor,{precursor}\nproduct,{product}\n");
        let ys = generate_trace(times, &[(rt, 0.04, amp * 0.5)], amp * 0.005, rng);
        for (t, y) in times.iter().zip(ys) {
            let _ = writeln!(out, "{t:.3},{y}");
        }
        out.push('\n');
    }
    out
}

/// `1234.0` → `1,234`
fn thousands(v: f64) -> String {
    let digits = format!("{}", v as i64);
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

fn write(dir: &Path, name: &str, content: &str) -> Result<()> {
    let path = dir.join(name);
    std::fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn main() -> Result<()> {
    let dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sample_data"));
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut rng = SimpleRng::new(42);

    // Retention times: 0 → 5 min, step 0.01
    let times: Vec<f64> = (0..500).map(|i| i as f64 * 0.01).collect();

    write(&dir, "shimadzu_caffeine.txt", &shimadzu(&times, &mut rng))?;
    write(&dir, "thermo_blank.csv", &thermo(&times, &mut rng))?;
    write(&dir, "waters_qc.csv", &waters(&times, &mut rng))?;
    Ok(())
}

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs::File;
use std::io::{BufWriter, Write};

#[derive(Debug, Clone, Copy)]
pub struct GeneratorParams {
    pub nets: usize,
    pub die_size: i64,
    pub metal_layers: usize,
    pub pitch: i64,
    pub macros: usize,
    pub seed: u64,
}

/// Writes a random design record file for benchmarking the router.
pub fn generate_random_design(filename: &str, params: GeneratorParams) -> std::io::Result<()> {
    let file = BufWriter::new(File::create(filename)?);
    write_random_design(file, params)
}

pub fn write_random_design<W: Write>(mut file: W, params: GeneratorParams) -> std::io::Result<()> {
    let mut rng = StdRng::seed_from_u64(params.seed);
    let die = params.die_size.max(params.pitch * 20);
    let pitch = params.pitch.max(2);
    let width = pitch / 2;
    let layers = params.metal_layers.max(2);

    log::info!(
        "Generating design: {} nets, {} metal layers, die {}x{}, seed {}",
        params.nets,
        layers,
        die,
        die,
        params.seed
    );

    writeln!(file, "name = \"random_{}\"", params.seed)?;
    writeln!(file, "die_area = [0, 0, {}, {}]", die, die)?;

    for m in 1..=layers {
        let dir = if m % 2 == 1 { "horizontal" } else { "vertical" };
        writeln!(file, "\n[[layers]]")?;
        writeln!(file, "name = \"M{}\"", m)?;
        writeln!(file, "type = \"routing\"")?;
        writeln!(file, "direction = \"{}\"", dir)?;
        writeln!(file, "pitch = {}", pitch)?;
        writeln!(file, "width = {}", width)?;
        writeln!(file, "spacing = {}", pitch - width)?;
        if m < layers {
            writeln!(file, "\n[[layers]]")?;
            writeln!(file, "name = \"V{}\"", m)?;
            writeln!(file, "type = \"cut\"")?;
            writeln!(file, "width = {}", width)?;
        }
    }

    let half = width / 2;
    for m in 1..layers {
        writeln!(file, "\n[[vias]]")?;
        writeln!(file, "name = \"VIA{}{}\"", m, m + 1)?;
        writeln!(file, "layers = [\"M{}\", \"V{}\", \"M{}\"]", m, m, m + 1)?;
        writeln!(file, "cut = [{}, {}, {}, {}]", -half, -half, half, half)?;
        writeln!(file, "default = true")?;
    }

    let snap = |v: i64| (v / pitch) * pitch + pitch / 2;
    for i in 0..params.nets {
        let degree = rng.gen_range(2..=4);
        let class = if i % 97 == 0 { "clock" } else { "signal" };
        writeln!(file, "\n[[nets]]")?;
        writeln!(file, "name = \"net{}\"", i)?;
        writeln!(file, "class = \"{}\"", class)?;
        let cx = rng.gen_range(0..die);
        let cy = rng.gen_range(0..die);
        let spread = (die / 8).max(pitch * 4);
        for p in 0..degree {
            let x = snap((cx + rng.gen_range(-spread..=spread)).clamp(0, die - pitch));
            let y = snap((cy + rng.gen_range(-spread..=spread)).clamp(0, die - pitch));
            writeln!(file, "\n[[nets.pins]]")?;
            writeln!(file, "name = \"p{}\"", p)?;
            writeln!(
                file,
                "shapes = [{{ layer = \"M1\", rect = [{}, {}, {}, {}] }}]",
                x - half,
                y - half,
                x + half,
                y + half
            )?;
        }
    }

    for _ in 0..params.macros {
        let w = rng.gen_range(die / 20..=die / 6);
        let h = rng.gen_range(die / 20..=die / 6);
        let x = rng.gen_range(0..die - w);
        let y = rng.gen_range(0..die - h);
        for m in 1..=layers.min(2) {
            writeln!(file, "\n[[obstructions]]")?;
            writeln!(file, "layer = \"M{}\"", m)?;
            writeln!(file, "rect = [{}, {}, {}, {}]", x, y, x + w, y + h)?;
            writeln!(file, "kind = \"macro\"")?;
        }
    }

    writeln!(file, "\n[[rules]]")?;
    writeln!(file, "layer = \"M1\"")?;
    writeln!(file, "property = \"SPACING\"")?;
    writeln!(file, "text = \"SPACING {} ;\"", pitch - width)?;
    writeln!(file, "\n[[rules]]")?;
    writeln!(file, "layer = \"M1\"")?;
    writeln!(file, "property = \"AREA\"")?;
    writeln!(file, "text = \"AREA {} ;\"", width * width * 4)?;

    file.flush()
}

use nipals_pca::io::{read_delimited, ReadOptions};
use nipals_pca::{NipalsConfig, NipalsPCA, Preprocessing};

// Usage: cargo run --example fit_delimited -- <file.csv> <components>
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let path = args.next().ok_or("missing path to a delimited file")?;
    let n_components: usize = args.next().unwrap_or_else(|| "2".to_string()).parse()?;

    let mut data = read_delimited(&path, &ReadOptions::default())?;
    Preprocessing::Standardize.apply(&mut data.matrix)?;

    let pca = NipalsPCA::new(NipalsConfig::default());
    let output = pca.fit(&data.matrix, n_components)?;

    for (k, summary) in output.components.iter().enumerate() {
        println!(
            "Component {}: eigenvalue {:.4}, {} iterations, {:?}, cumulative R^2 {:.4}",
            k + 1,
            summary.eigenvalue,
            summary.iterations,
            summary.status,
            output.explained_variance[k + 1]
        );
    }
    println!("Loadings:");
    for (name, column) in data.variables.iter().zip(output.loadings.columns()) {
        println!("  {:>12}: {:?}", name, column.to_vec());
    }
    Ok(())
}

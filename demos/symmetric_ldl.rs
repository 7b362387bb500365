//! Factors the symmetric matrix `A[i][j] = i + j` with the regularized LDL decomposition over a
//! process grid.
//!
//! ```sh
//! cargo run --example symmetric_ldl -- --size 100 --processes 6
//! ```

use clap::Parser;
use gridla::{
    ldl::*,
    norm::hermitian_entrywise_one_norm_dist,
    DistMatrix, FactorParams, Format, Grid, Side,
};

#[derive(Parser)]
#[command(name = "symmetric_ldl")]
#[command(about = "Regularized LDL of the i + j matrix over a process grid")]
struct Cli {
    /// Size of the matrix.
    #[arg(long, default_value_t = 100)]
    size: usize,
    /// Number of processes in the grid.
    #[arg(long, default_value_t = 4)]
    processes: usize,
    /// Height of the grid (defaults to the most square grid).
    #[arg(long)]
    height: Option<usize>,
    /// Panel width of the blocked factorization.
    #[arg(long, default_value_t = 32)]
    block_size: usize,
    /// Pivots whose signed value is below this are replaced.
    #[arg(long, default_value_t = 1e-12)]
    pivot_tolerance: f64,
    /// Magnitude of the replacement pivots.
    #[arg(long, default_value_t = 1e-8)]
    regularization_magnitude: f64,
    /// Print the factors.
    #[arg(long)]
    print: bool,
}

struct Report {
    input_norm: f64,
    factor_norm: f64,
    regularization_norm: f64,
    regularization_count: usize,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let height = cli.height.unwrap_or_else(|| Grid::default_height(cli.processes));
    anyhow::ensure!(
        height > 0 && cli.processes % height == 0,
        "grid height {height} does not divide {} processes",
        cli.processes
    );
    let width = cli.processes / height;
    let n = cli.size;
    let params = FactorParams::default().with_block_size(cli.block_size);
    let regularization = LdlRegularization::<f64> {
        pivot_tolerance: cli.pivot_tolerance,
        regularization_magnitude: cli.regularization_magnitude,
    };

    println!("matrix size:  {n}");
    println!("process grid: {height}×{width}");
    println!("block size:   {}", cli.block_size);

    let reports = Grid::run(height, width, |grid| -> gridla::Result<Report> {
        // each process fills the entries it owns
        let mut a = DistMatrix::<f64>::zeros(grid, Format::MC_MR, n, n)?;
        for local_j in 0..a.local_ncols() {
            let j = a.global_col(local_j);
            for local_i in 0..a.local_nrows() {
                let i = a.global_row(local_i);
                a.set_local(local_i, local_j, (i + j) as f64);
            }
        }
        let input_norm = hermitian_entrywise_one_norm_dist(Side::Lower, a.as_ref())?;

        let signs = DistMatrix::from_fn(grid, Format::MC_STAR, n, 1, |_, _| 1i8)?;
        let mut reg = DistMatrix::<f64>::zeros(grid, Format::MC_STAR, n, 1)?;
        let info = ldl_regularized_dist_in_place(
            a.as_mut(),
            signs.as_ref(),
            reg.as_mut(),
            regularization,
            params,
        )?;

        let factor_norm = hermitian_entrywise_one_norm_dist(Side::Lower, a.as_ref())?;
        let reg_norm = reg
            .to_mat()?
            .col_as_slice(0)
            .iter()
            .map(|r| r.abs())
            .sum::<f64>();

        if cli.print {
            let factors = a.to_mat()?;
            if grid.vc_rank() == 0 {
                println!("factors = {factors:?}");
            }
        }

        Ok(Report {
            input_norm,
            factor_norm,
            regularization_norm: reg_norm,
            regularization_count: info.regularization_count,
        })
    })?;

    let report = reports
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("the grid has no processes"))??;
    println!("|| A ||_1 (hermitian, entrywise):       {:e}", report.input_norm);
    println!("|| L/D ||_1 (hermitian, entrywise):     {:e}", report.factor_norm);
    println!("|| regularization ||_1:                 {:e}", report.regularization_norm);
    println!("regularized pivots:                     {}", report.regularization_count);
    Ok(())
}

use region_mesh::output::{print_summary, write_plan};
use region_mesh::{lookup_for, run, Config};
use std::error::Error;
use std::path::Path;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Do as little as possible in main.rs as it can't contain any tests
    log4rs::init_file("log4rs.yml", Default::default())
        .map_err(|e| format!("Error initializing log4rs: {e}"))?;
    dotenv::dotenv().ok();
    log::info!("#Start main()");

    let config = Config::from_env();
    let stack = run(&config, lookup_for(&config)).await?;
    let plan = stack.plan();

    write_plan(&plan, Path::new(&config.plan_file))?;
    print_summary(&plan);

    Ok(())
}

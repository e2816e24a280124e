use std::net::IpAddr;

use env_logger::Env;
use ipam_rib::{Error, LabelSet, Prefix, Requirement, Rib, RibConfig, Route, Selector};

const SEPARATOR_WIDTH: usize = 64;

/// Print a usage message
fn print_usage() {
    println!("ipam-rib - In-memory IP address management table");
    println!("Usage:");
    println!("  ipam-rib [OPTIONS]");
    println!();
    println!("Builds a small demo table and walks through parent/child lookups,");
    println!("free-space allocation, range registration and label selectors.");
    println!();
    println!("Options:");
    println!("  --json            Only print the final table as JSON");
    println!("  --help            Show this help message");
    println!();
    println!("Logging is controlled with RUST_LOG (default: warn).");
}

struct Options {
    json: bool,
}

/// Parse command line arguments
fn parse_args() -> Result<Options, String> {
    let mut options = Options { json: false };
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--json" => options.json = true,
            other => return Err(format!("Unknown option: {}", other)),
        }
    }
    Ok(options)
}

fn separator() {
    println!("{}", "#".repeat(SEPARATOR_WIDTH));
}

fn print_routes(routes: &[Route]) {
    for route in routes {
        println!("  {}", route);
    }
}

fn build_table(rib: &Rib, verbose: bool) -> Result<(), Error> {
    let cidrs: &[(&str, &[(&str, &str)])] = &[
        ("10.0.0.0/8", &[("description", "rfc1918")]),
        ("10.0.0.0/16", &[("description", "10.0/16-subnet")]),
        ("10.1.0.0/16", &[("description", "10.1/16-subnet")]),
        ("10.0.0.0/24", &[("description", "10.0.0/24-subnet")]),
        ("10.0.1.0/24", &[("description", "10.0.1/24-subnet")]),
        ("192.0.0.0/12", &[("rir", "RIPE")]),
        ("192.168.0.0/16", &[("type", "aggregate")]),
        ("192.169.0.0/16", &[("type", "aggregate")]),
        ("192.168.0.0/24", &[("type", "prefix")]),
        ("192.168.0.0/25", &[("type", "prefix"), ("description", "hans1")]),
        ("192.168.0.128/25", &[("type", "prefix"), ("description", "hans2")]),
        ("85.255.192.0/12", &[("type", "prefix"), ("rir", "RIPE")]),
    ];

    for (cidr, labels) in cidrs {
        let route = Route::new(cidr.parse()?, labels.iter().copied().collect());
        if verbose {
            println!("Adding {} to the table", route);
        }
        if let Err(e) = rib.add(route) {
            log::warn!("{}", e);
        }
    }
    Ok(())
}

fn parse_addr(s: &str) -> Result<IpAddr, Error> {
    s.parse().map_err(|_| Error::InvalidPrefix(s.to_string()))
}

fn dump_json(rib: &Rib) {
    match serde_json::to_string_pretty(&rib.routes()) {
        Ok(json) => println!("{}", json),
        Err(e) => log::error!("failed to serialize table: {}", e),
    }
}

fn run(options: Options) -> Result<(), Error> {
    let config = RibConfig::default().with_default_labels(LabelSet::from([("env", "prod")]));
    let rib = Rib::with_config(config);

    if options.json {
        build_table(&rib, false)?;
        dump_json(&rib);
        return Ok(());
    }

    println!("The table contains {} prefixes", rib.len());
    separator();
    build_table(&rib, true)?;
    separator();
    println!("The table contains {} prefixes", rib.len());
    separator();

    let extra = Route::new(
        "192.168.0.192/26".parse()?,
        LabelSet::from([("foo", "bar"), ("boo", "hoo")]),
    );
    match rib.add(extra.clone()) {
        Ok(()) => {
            println!("Adding {} to the table", extra);
            println!("{} has label foo: {}", extra.prefix(), extra.has("foo"));
        }
        Err(e) => println!("{}", e),
    }
    separator();

    let host: Prefix = "192.168.0.255/32".parse()?;
    println!("Parents of {}:", host);
    print_routes(&rib.parents(&host));

    let block: Prefix = "10.0.0.0/16".parse()?;
    println!("Children of {}:", block);
    print_routes(&rib.children(&block));
    separator();

    let len = 19;
    println!("Finding a free /{} in {}", len, block);
    println!("All free prefixes: {}", rib.free_prefixes(&block));
    println!("Returned free prefix: {}", rib.find_free_prefix(&block, len)?);
    let parent = rib.get(&block)?;
    println!("Via the route: {}", parent.find_free_prefix(&rib, len)?);
    separator();

    println!("Table contents:");
    print_routes(&rib.routes());
    separator();

    let start = parse_addr("193.168.0.0")?;
    let end = parse_addr("193.168.0.132")?;
    match rib.add_range(start, end, LabelSet::new()) {
        Ok(routes) => {
            println!("Range {}-{} added as:", start, end);
            print_routes(&routes);
        }
        Err(e) => println!("{}", e),
    }
    separator();

    let by_requirement = Selector::new().with(Requirement::not_in_set("type", ["aggregate"]));
    println!("Selecting with {}", by_requirement);
    print_routes(&rib.select(&by_requirement));
    println!();

    let by_string = Selector::parse("type notin (aggregate), description!=hans1")?;
    println!("Selecting with {}", by_string);
    print_routes(&rib.select(&by_string));
    separator();

    println!("Table as JSON:");
    dump_json(&rib);
    separator();
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let options = match parse_args() {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = run(options) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

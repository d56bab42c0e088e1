//! TyrantKV CLI Client
//!
//! Command-line interface for talking to a ttserver.

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};
use tyrantkv::{Config, Order, Query, QueryOp, Tyrant, TyrantError};

/// TyrantKV CLI
#[derive(Parser, Debug)]
#[command(name = "tyrant-cli")]
#[command(about = "CLI for Tokyo Tyrant servers")]
#[command(version)]
struct Args {
    /// Server address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:1978")]
    server: String,

    /// Read/write timeout in milliseconds (0 = none)
    #[arg(short, long, default_value = "5000")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        key: String,
    },

    /// Store a key-value pair
    Put {
        key: String,
        value: String,

        /// Fail instead of overwriting an existing record
        #[arg(long)]
        keep: bool,
    },

    /// Remove a key
    Out {
        key: String,
    },

    /// Add to an integer record
    Addint {
        key: String,
        num: i32,
    },

    /// List keys, optionally only those with a prefix
    Keys {
        #[arg(short, long)]
        prefix: Option<String>,

        /// Maximum number of keys (prefix listing only)
        #[arg(short, long)]
        max: Option<usize>,
    },

    /// Number of records
    Rnum,

    /// Database size in bytes
    Size,

    /// Server status
    Stat,

    /// Remove all records
    Vanish,

    /// Search a table database
    Search {
        /// Condition as column:op:operand (op: streq, strbw, numeq, numgt, numge, numlt, numle, numbt)
        #[arg(short, long = "cond")]
        conditions: Vec<String>,

        /// Order as column:type (type: strasc, strdesc, numasc, numdesc)
        #[arg(short, long)]
        order: Option<String>,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,

        /// Only count matching records
        #[arg(long)]
        count: bool,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    let config = Config::builder()
        .addr(&args.server)
        .timeout_ms(args.timeout_ms)
        .build();

    let client = match Tyrant::connect(config) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("Failed to connect to {}: {}", args.server, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&client, args.command) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(client: &Tyrant, command: Commands) -> Result<(), TyrantError> {
    match command {
        Commands::Get { key } => match client.get(key.as_bytes())? {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => println!("(nil)"),
        },
        Commands::Put { key, value, keep } => {
            if keep {
                if !client.putkeep(key.as_bytes(), value.as_bytes())? {
                    println!("EXISTS");
                    return Ok(());
                }
            } else {
                client.put(key.as_bytes(), value.as_bytes())?;
            }
            println!("OK");
        }
        Commands::Out { key } => {
            let removed = client.out(key.as_bytes())?;
            println!("{}", if removed { "OK" } else { "(nil)" });
        }
        Commands::Addint { key, num } => println!("{}", client.addint(key.as_bytes(), num)?),
        Commands::Keys { prefix, max } => {
            let keys = match prefix {
                Some(prefix) => client.fwmkeys(prefix.as_bytes(), max)?,
                None => client.keys()?,
            };
            for key in keys {
                println!("{}", String::from_utf8_lossy(&key));
            }
        }
        Commands::Rnum => println!("{}", client.rnum()?),
        Commands::Size => println!("{}", client.size()?),
        Commands::Stat => {
            for (name, value) in client.stat()? {
                println!("{}\t{}", name, value);
            }
        }
        Commands::Vanish => {
            client.vanish()?;
            println!("OK");
        }
        Commands::Search {
            conditions,
            order,
            limit,
            count,
        } => {
            let query = build_query(&conditions, order.as_deref(), limit)?;
            if count {
                println!("{}", client.search_count(&query)?);
            } else {
                for key in client.search(&query)? {
                    println!("{}", String::from_utf8_lossy(&key));
                }
            }
        }
    }
    Ok(())
}

fn build_query(conditions: &[String], order: Option<&str>, limit: Option<usize>) -> Result<Query, TyrantError> {
    let mut query = Query::new();

    for condition in conditions {
        let mut parts = condition.splitn(3, ':');
        let (Some(column), Some(op), Some(operand)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid(format!("condition '{}' is not column:op:operand", condition)));
        };
        query.add_condition(column, parse_op(op)?, operand, false);
    }

    if let Some(order) = order {
        let (column, kind) = order
            .split_once(':')
            .ok_or_else(|| invalid(format!("order '{}' is not column:type", order)))?;
        query.set_order(column, parse_order(kind)?);
    }

    if limit.is_some() {
        query.set_limit(limit, 0);
    }

    Ok(query)
}

fn parse_op(op: &str) -> Result<QueryOp, TyrantError> {
    Ok(match op {
        "streq" => QueryOp::StrEq,
        "strinc" => QueryOp::StrInclude,
        "strbw" => QueryOp::StrBeginsWith,
        "strew" => QueryOp::StrEndsWith,
        "numeq" => QueryOp::NumEq,
        "numgt" => QueryOp::NumGt,
        "numge" => QueryOp::NumGe,
        "numlt" => QueryOp::NumLt,
        "numle" => QueryOp::NumLe,
        "numbt" => QueryOp::NumBetween,
        other => return Err(invalid(format!("unknown operator '{}'", other))),
    })
}

fn parse_order(kind: &str) -> Result<Order, TyrantError> {
    Ok(match kind {
        "strasc" => Order::StrAsc,
        "strdesc" => Order::StrDesc,
        "numasc" => Order::NumAsc,
        "numdesc" => Order::NumDesc,
        other => return Err(invalid(format!("unknown order type '{}'", other))),
    })
}

fn invalid(reason: String) -> TyrantError {
    TyrantError::InvalidArgument(reason)
}

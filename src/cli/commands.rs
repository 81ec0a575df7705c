//! Subcommand implementations.

use super::{Command, GetArgs, SetArgs};
use crate::context::ContextStore;
use crate::resolver::Resolver;
use crate::variable::Variable;
use anyhow::{Context, Result};
use std::io::Write;

/// Run a subcommand, writing its output to `out`.
pub async fn run<W: Write>(command: &Command, resolver: &Resolver, out: &mut W) -> Result<()> {
    match command {
        Command::Get(args) => get(args, resolver, out).await,
        Command::Set(args) => set(args, resolver, out).await,
        Command::Contexts => contexts(resolver, out).await,
        Command::Config => config(resolver, out),
    }
}

async fn get<W: Write>(args: &GetArgs, resolver: &Resolver, out: &mut W) -> Result<()> {
    let mut var: Variable = Variable::new(&args.name);
    if let Some(key) = &args.key {
        var = var.with_key(key);
    }
    if let Some(env) = &args.env {
        var = var.with_env(env);
    }
    if let Some(default) = &args.default {
        var = var.with_default(default);
    }

    let value = resolver.get(&var).await?;
    writeln!(out, "{}", value)?;
    Ok(())
}

async fn set<W: Write>(args: &SetArgs, resolver: &Resolver, out: &mut W) -> Result<()> {
    let store = ContextStore::from_config(&resolver.config());
    let path = store
        .write(&args.context_name, &args.key, &args.value)
        .await
        .with_context(|| format!("saving {} to context {}", args.key, args.context_name))?;
    writeln!(out, "Saved {} to {}", args.key, path.display())?;
    Ok(())
}

async fn contexts<W: Write>(resolver: &Resolver, out: &mut W) -> Result<()> {
    let config = resolver.config();
    let discovered = ContextStore::from_config(&config).discover().await;
    if discovered.is_empty() {
        writeln!(out, "No contexts found under {}", config.root.display())?;
        return Ok(());
    }
    for (name, path) in discovered.iter() {
        let marker = if config.contexts.iter().any(|c| c == name) {
            '*'
        } else {
            ' '
        };
        writeln!(out, "{} {}\t{}", marker, name, path.display())?;
    }
    Ok(())
}

fn config<W: Write>(resolver: &Resolver, out: &mut W) -> Result<()> {
    let json = serde_json::to_string_pretty(&resolver.config())?;
    writeln!(out, "{}", json)?;
    Ok(())
}

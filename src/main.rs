use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Parser};
use descriptor_compiler::config::ConfigError;
use descriptor_compiler::{
    compile, logger, map_source, parse_descriptor_json, CompilerConfig, QueryScope, RecordingQuery,
    SqlCompiler,
};
use log::{info, warn, LevelFilter};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::fs;
use std::path::{Path, PathBuf};

/// 将查询描述符(JSON)编译为 PostgreSQL
#[derive(Debug, Parser)]
#[command(name = "descriptor-compiler", version)]
#[command(group(ArgGroup::new("scope").required(true).args(["collection", "collection_group"])))]
struct Cli {
    /// JSON配置文件
    #[arg(long, default_value = "compiler_config.json")]
    config: PathBuf,

    /// 集合路径, 例如 teams/t1/users
    #[arg(long)]
    collection: Option<String>,

    /// 集合组ID
    #[arg(long)]
    collection_group: Option<String>,

    /// 读取来源: serverAndCache | server | cache
    #[arg(long, default_value = "serverAndCache")]
    source: String,

    /// 同时打印各编译阶段
    #[arg(long)]
    explain: bool,

    #[arg(short, long)]
    verbose: bool,

    /// 描述符文件; 省略时进入交互模式, 每行一个描述符.
    /// 过滤树最多嵌套62层组合节点
    file: Option<PathBuf>,
}

impl Cli {
    fn scope(&self) -> Result<QueryScope> {
        match (&self.collection, &self.collection_group) {
            (Some(path), None) => Ok(QueryScope::Collection(path.clone())),
            (None, Some(id)) => Ok(QueryScope::CollectionGroup(id.clone())),
            _ => bail!("exactly one of --collection or --collection-group is required"),
        }
    }
}

/// 创建SQL编译器实例，优先使用JSON配置，失败时使用默认配置
fn create_compiler(path: &Path) -> SqlCompiler {
    match CompilerConfig::from_json_file(path) {
        Ok(config) => {
            info!("loaded compiler config from {}", path.display());
            for (collection, table) in &config.table_mapping {
                info!("  {} -> {}", collection, table);
            }
            SqlCompiler::from_config(config)
        }
        Err(ConfigError::NotFound(_)) => {
            info!("no config at {}, using defaults", path.display());
            SqlCompiler::new()
        }
        Err(e) => {
            warn!("{}; using defaults", e);
            SqlCompiler::new()
        }
    }
}

fn run_descriptor(compiler: &SqlCompiler, scope: &QueryScope, json: &str, explain: bool) -> Result<()> {
    let descriptor = parse_descriptor_json(json)?;

    if explain {
        let trace = compile(&descriptor, RecordingQuery::new(scope.clone()))?;
        print!("{}", trace);
    }

    let result = compiler.compile(&descriptor, scope.clone())?;
    println!("{}", result.sql);
    if result.reverse_results {
        println!("-- limitToLast: reverse the fetched rows");
    }
    for optimization in &result.optimizations {
        println!("-- optimization: {:?}", optimization);
    }
    for diagnostic in &result.diagnostics {
        println!("-- note: {:?}", diagnostic);
    }
    Ok(())
}

fn repl(compiler: &SqlCompiler, scope: &QueryScope, explain: bool) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    println!("--- {} --- (Ctrl-D 退出)", scope);
    loop {
        match editor.readline("descriptor> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line);
                if let Err(e) = run_descriptor(compiler, scope, line, explain) {
                    eprintln!("✗ {}", e);
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    if let Err(e) = logger::init(level) {
        eprintln!("logger init failed: {}", e);
    }

    let source = map_source(&cli.source)?;
    info!("read source: {:?}", source);

    let compiler = create_compiler(&cli.config);
    let scope = cli.scope()?;

    match &cli.file {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("无法读取描述符文件 {}", path.display()))?;
            run_descriptor(&compiler, &scope, &json, cli.explain)
        }
        None => repl(&compiler, &scope, cli.explain),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_flags() {
        let cli = Cli::try_parse_from(["descriptor-compiler", "--collection", "teams/t1/users"]).unwrap();
        assert_eq!(cli.scope().unwrap(), QueryScope::Collection("teams/t1/users".to_string()));

        let cli = Cli::try_parse_from(["descriptor-compiler", "--collection-group", "users"]).unwrap();
        assert_eq!(cli.scope().unwrap(), QueryScope::CollectionGroup("users".to_string()));
    }

    #[test]
    fn test_scope_is_required_and_exclusive() {
        assert!(Cli::try_parse_from(["descriptor-compiler"]).is_err());
        assert!(Cli::try_parse_from([
            "descriptor-compiler",
            "--collection",
            "users",
            "--collection-group",
            "users"
        ])
        .is_err());
    }

    #[test]
    fn test_scope_without_flags_is_an_error() {
        let cli = Cli {
            config: PathBuf::from("compiler_config.json"),
            collection: None,
            collection_group: None,
            source: "serverAndCache".to_string(),
            explain: false,
            verbose: false,
            file: None,
        };
        assert!(cli.scope().is_err());
    }
}

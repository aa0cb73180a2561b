//! Batch price redaction for invoice PDFs.

mod batch;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use pricemask_core::{load_config, save_config, RedactConfig};
use pricemask_pdf::{CleaningOptions, ExtractorKind, PdfOptions, RedactionMode};

use batch::{run_batch, BatchOptions, BatchReport};

/// 发票价格脱敏：覆盖单价、金额与大写合计，输出 `<文件名>_tosale.pdf`
#[derive(Parser, Debug)]
#[command(name = "pricemask")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// 待处理的 PDF 文件
    #[arg(required_unless_present = "write_config")]
    inputs: Vec<PathBuf>,

    /// 输出目录
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// 输出文件名后缀
    #[arg(long, default_value = "_tosale")]
    suffix: String,

    /// 合成策略：strip（删除文字并覆盖）或 cover（仅覆盖）
    #[arg(short, long, default_value_t = RedactionMode::StripAndCover)]
    mode: RedactionMode,

    /// 文字提取器：auto, lopdf, pdfium
    #[arg(short, long, default_value_t = ExtractorKind::Auto)]
    extractor: ExtractorKind,

    /// 引擎配置文件（JSON）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 把当前生效的配置写到指定文件后退出
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,

    /// 清理文档信息字典（标题、作者等）
    #[arg(long)]
    clean_info: bool,

    /// 写出前复查输出文档
    #[arg(long)]
    verify: bool,

    /// 把处理报告写成 JSON
    #[arg(long)]
    report: Option<PathBuf>,

    /// 并行处理的文档数，默认按 CPU 核数
    #[arg(short, long)]
    jobs: Option<usize>,

    /// 日志详细程度（-v debug，-vv trace）
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .init();
}

fn resolve_config(path: Option<&Path>) -> Result<RedactConfig> {
    let config = match path {
        Some(path) => load_config(path).with_context(|| format!("无法读取配置 {}", path.display()))?,
        None => RedactConfig::default(),
    };
    config.validate().context("配置无效")?;
    Ok(config)
}

fn print_summary(report: &BatchReport) {
    for doc in &report.documents {
        match (&doc.output, &doc.error) {
            (Some(output), _) => {
                println!("✓ {} -> {} ({} 个覆盖框)", doc.input.display(), output.display(), doc.rects);
                for page in &doc.degraded_pages {
                    println!("  ! 第 {} 页未脱敏，{}，请人工复核", page.page, page.describe());
                }
                for page in &doc.item_only_header_pages {
                    println!("  ! 第 {} 页表头只匹配到 ITEM，请确认表格范围", page);
                }
                if doc.skipped_malformed > 0 {
                    println!("  ! {} 个词坐标异常未覆盖，请人工复核", doc.skipped_malformed);
                }
            }
            (None, Some(error)) => println!("✗ {}: {}", doc.input.display(), error),
            (None, None) => {}
        }
    }
    println!(
        "完成: {} 成功, {} 失败, {} 页需复核",
        report.succeeded(),
        report.failed(),
        report.degraded()
    );
}

fn run(cli: Cli) -> Result<bool> {
    let config = resolve_config(cli.config.as_deref())?;

    if let Some(path) = &cli.write_config {
        save_config(path, &config).with_context(|| format!("无法写入配置 {}", path.display()))?;
        println!("配置已写入 {}", path.display());
        return Ok(true);
    }

    fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("无法创建输出目录 {}", cli.out_dir.display()))?;

    if let Some(jobs) = cli.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .context("无法初始化线程池")?;
    }

    let pdf = PdfOptions {
        mode: cli.mode,
        extractor: cli.extractor,
        cleaning: CleaningOptions {
            document_info: cli.clean_info,
        },
        ..PdfOptions::from_config(&config)
    };
    let options = BatchOptions {
        out_dir: cli.out_dir,
        suffix: cli.suffix,
        pdf,
        config,
        verify: cli.verify,
    };

    log::info!(
        "[Batch] {} 个文件, 模式 {}, 提取器 {}",
        cli.inputs.len(),
        options.pdf.mode,
        options.pdf.extractor
    );
    let report = run_batch(&cli.inputs, &options);
    print_summary(&report);

    if let Some(path) = &cli.report {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(path, json).with_context(|| format!("无法写入报告 {}", path.display()))?;
    }

    Ok(report.failed() == 0)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("错误: {:#}", e);
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["pricemask", "a.pdf", "b.pdf"]).unwrap();
        assert_eq!(cli.inputs.len(), 2);
        assert_eq!(cli.suffix, "_tosale");
        assert_eq!(cli.mode, RedactionMode::StripAndCover);
        assert_eq!(cli.extractor, ExtractorKind::Auto);
        assert!(!cli.verify);
    }

    #[test]
    fn test_cli_mode_flag() {
        let cli = Cli::try_parse_from(["pricemask", "--mode", "cover", "-e", "lopdf", "a.pdf"]).unwrap();
        assert_eq!(cli.mode, RedactionMode::CoverOnly);
        assert_eq!(cli.extractor, ExtractorKind::Lopdf);
        assert!(Cli::try_parse_from(["pricemask", "--mode", "blur", "a.pdf"]).is_err());
    }

    #[test]
    fn test_cli_requires_input() {
        assert!(Cli::try_parse_from(["pricemask"]).is_err());
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pricemask.json");
        fs::write(&path, r#"{"footerMargin": 14.0, "rules": {"currencyCodes": ["USD", "EUR"]}}"#).unwrap();

        let config = resolve_config(Some(&path)).unwrap();
        assert_eq!(config.footer_margin, 14.0);
        assert_eq!(config.header_margin, 6.0);
        assert_eq!(config.rules.currency_codes, vec!["USD", "EUR"]);
        assert_eq!(config.rules.forbidden_keywords.len(), 4);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{"lineTolerance": -1.0}"#).unwrap();
        assert!(resolve_config(Some(&path)).is_err());
    }

    #[test]
    fn test_write_config_needs_no_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let args = [
            std::ffi::OsStr::new("pricemask"),
            std::ffi::OsStr::new("--write-config"),
            path.as_os_str(),
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(cli.inputs.is_empty());

        assert!(run(cli).unwrap());
        let written = resolve_config(Some(&path)).unwrap();
        assert_eq!(written.line_tolerance, 2.0);
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = resolve_config(Some(&dir.path().join("none.json"))).unwrap();
        assert_eq!(config.line_tolerance, 2.0);
    }
}

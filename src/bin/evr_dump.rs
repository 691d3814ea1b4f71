use anyhow::{Context, Result, anyhow, bail};
use clap::{Arg, ArgAction, ArgMatches, Command};
use dialoguer::Confirm;
use indoc::indoc;

use evr::{
    DecodedEvr, DictionaryBundle, EvrExtractor, ExtractorSettings, ExtractorVariant, PacketInfo,
    TelemetryPacket,
};
use log::{Level, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::process::exit;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum EvrOutputFormat {
    Json,
    JsonL,
    Summary,
}

struct EvrDump {
    extractor: EvrExtractor,
    input: String,
    output_format: EvrOutputFormat,
    output: Box<dyn Write>,
    verbosity_level: Option<Level>,
    primary_header_len: usize,
    secondary_header_len: usize,
}

impl EvrDump {
    pub fn from_cli_matches(matches: &ArgMatches) -> Result<Self> {
        let input = matches
            .get_one::<String>("PACKETS")
            .cloned()
            .ok_or_else(|| anyhow!("PACKETS is a required argument"))?;

        let output_format = match matches
            .get_one::<String>("output-format")
            .map(String::as_str)
            .unwrap_or("summary")
        {
            "json" => EvrOutputFormat::Json,
            "jsonl" => EvrOutputFormat::JsonL,
            _ => EvrOutputFormat::Summary,
        };

        let num_threads = matches.get_one::<usize>("num-threads").copied().unwrap_or(0);
        let num_threads = match (cfg!(feature = "multithreading"), num_threads) {
            (true, number) => number,
            (false, n) if n > 1 => {
                eprintln!(
                    "turned on threads, but library was compiled without `multithreading` feature! using sequential decoding"
                );
                1
            }
            (false, _) => 1,
        };

        let verbosity_level = match matches.get_count("verbose") {
            0 => None,
            1 => Some(Level::Info),
            2 => Some(Level::Debug),
            3 => Some(Level::Trace),
            _ => {
                eprintln!("using more than -vvv does not affect verbosity level");
                Some(Level::Trace)
            }
        };

        let dictionary_path = matches
            .get_one::<String>("dictionary")
            .ok_or_else(|| anyhow!("--dictionary is a required argument"))?;
        let dictionaries = DictionaryBundle::from_path(dictionary_path)
            .and_then(|bundle| bundle.into_dictionaries())
            .with_context(|| format!("Failed to load dictionary `{dictionary_path}`"))?;

        let variant = if matches.get_flag("sse") {
            ExtractorVariant::Sse
        } else {
            ExtractorVariant::Multimission
        };

        let output: Box<dyn Write> = match matches.get_one::<String>("output-target") {
            Some(path) => Box::new(
                Self::create_output_file(path, !matches.get_flag("no-confirm-overwrite"))
                    .with_context(|| format!("An error occurred while creating output file at `{path}`"))?,
            ),
            None => Box::new(io::stdout()),
        };

        Ok(EvrDump {
            extractor: EvrExtractor::new(variant, dictionaries)
                .with_configuration(ExtractorSettings::new().num_threads(num_threads)),
            input,
            output_format,
            output,
            verbosity_level,
            primary_header_len: matches
                .get_one::<usize>("primary-header-len")
                .copied()
                .unwrap_or(evr::packet::CCSDS_PRIMARY_HEADER_LEN),
            secondary_header_len: matches
                .get_one::<usize>("secondary-header-len")
                .copied()
                .unwrap_or(0),
        })
    }

    /// Main entry point for `EvrDump`
    pub fn run(&mut self) -> Result<()> {
        self.try_to_initialize_logging();

        let reader: Box<dyn BufRead> = if self.input == "-" {
            Box::new(BufReader::new(io::stdin()))
        } else {
            let f = File::open(&self.input)
                .with_context(|| format!("Failed to open packet file `{}`", self.input))?;
            Box::new(BufReader::new(f))
        };

        let mut packets = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read line {}", i + 1))?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match self.parse_packet_line(line) {
                Ok(packet) => packets.push(packet),
                Err(e) => eprintln!("line {}: {:#}", i + 1, e),
            }
        }

        for result in self.extractor.decode_batch(&packets) {
            match result {
                Ok(evr) => self.dump_record(&evr)?,
                Err(e) => eprintln!("{e}"),
            }
        }

        self.output.flush()?;
        Ok(())
    }

    /// `[apid,vcid,dss,seq:]HEX`. An empty vcid means the packet had none.
    fn parse_packet_line(&self, line: &str) -> Result<TelemetryPacket> {
        let mut info = PacketInfo::new(self.primary_header_len, self.secondary_header_len);

        let hex = match line.split_once(':') {
            Some((prefix, hex)) => {
                let parts: Vec<&str> = prefix.split(',').map(str::trim).collect();
                let [apid, vcid, dss, seq] = parts.as_slice() else {
                    bail!("expected `apid,vcid,dss,seq:` before the packet bytes, got `{prefix}`");
                };
                info = info
                    .with_apid(apid.parse().context("bad apid")?)
                    .with_dss_id(dss.parse().context("bad dss id")?)
                    .with_seq_count(seq.parse().context("bad sequence count")?);
                if !vcid.is_empty() {
                    info = info.with_vcid(vcid.parse().context("bad vcid")?);
                }
                hex
            }
            None => line,
        };

        Ok(TelemetryPacket::new(info, decode_hex(hex)?))
    }

    /// If `prompt` is passed, will display a confirmation prompt before overwriting files.
    fn create_output_file(path: impl AsRef<Path>, prompt: bool) -> Result<File> {
        let p = path.as_ref();

        if p.is_dir() {
            bail!("There is a directory at {}, refusing to overwrite", p.display());
        }

        if p.exists() {
            if prompt {
                match Confirm::new()
                    .with_prompt(format!(
                        "Are you sure you want to override output file at {}",
                        p.display()
                    ))
                    .default(false)
                    .interact()
                {
                    Ok(true) => Ok(File::create(p)?),
                    Ok(false) => bail!("Cancelled"),
                    Err(e) => Err(anyhow!(e).context("Failed to write confirmation prompt to term")),
                }
            } else {
                Ok(File::create(p)?)
            }
        } else {
            // Ok to assume p is not an existing directory
            match p.parent() {
                Some(parent) => {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        fs::create_dir_all(parent)?;
                    }
                    Ok(File::create(p)?)
                }
                None => bail!("Output file cannot be root."),
            }
        }
    }

    fn dump_record(&mut self, evr: &DecodedEvr) -> Result<()> {
        match self.output_format {
            EvrOutputFormat::Json => writeln!(self.output, "{}", evr.to_json()?)?,
            EvrOutputFormat::JsonL => writeln!(self.output, "{}", serde_json::to_string(evr)?)?,
            EvrOutputFormat::Summary => writeln!(self.output, "{}", evr.one_line_summary())?,
        }
        Ok(())
    }

    fn try_to_initialize_logging(&self) {
        if let Some(level) = self.verbosity_level {
            if let Err(e) = TermLogger::init(
                level.to_level_filter(),
                Config::default(),
                TerminalMode::Stderr,
                ColorChoice::Auto,
            ) {
                eprintln!("Failed to initialize logging: {e}");
            }
        } else {
            log::set_max_level(LevelFilter::Off);
        }
    }
}

fn decode_hex(hex: &str) -> Result<Vec<u8>> {
    let digits: Vec<u8> = hex.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if digits.len() % 2 != 0 {
        bail!("odd number of hex digits ({})", digits.len());
    }

    digits
        .chunks(2)
        .map(|pair| {
            let s = std::str::from_utf8(pair)?;
            u8::from_str_radix(s, 16).with_context(|| format!("invalid hex byte `{s}`"))
        })
        .collect()
}

fn command() -> Command {
    Command::new("evr_dump")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Utility to decode Event Verification Records from telemetry packets")
        .arg(
            Arg::new("PACKETS")
                .required(true)
                .help("File of hex-encoded packets, one per line. `-` reads stdin."),
        )
        .arg(
            Arg::new("dictionary")
                .long("dictionary")
                .short('d')
                .required(true)
                .value_name("PATH")
                .help("JSON dictionary bundle with EVR definitions, command stems and sequence names."),
        )
        .arg(
            Arg::new("sse")
                .long("sse")
                .action(ArgAction::SetTrue)
                .help("Decode SSE EVRs, typing arguments from the message template instead of the dictionary."),
        )
        .arg(
            Arg::new("num-threads")
                .short('t')
                .long("threads")
                .default_value("0")
                .value_parser(clap::value_parser!(usize))
                .help("Sets the number of worker threads, defaults to number of CPU cores."),
        )
        .arg(
            Arg::new("output-format")
                .short('o')
                .long("format")
                .value_parser(["json", "jsonl", "summary"])
                .default_value("summary")
                .help("Sets the output format")
                .long_help(indoc!(r#"
                    Sets the output format:
                        "summary" - one line per EVR: NAME (id): message SCLK = .. SCET = .. LST = .. ERT = ..
                        "json"    - pretty printed JSON record per EVR.
                        "jsonl"   - one JSON record per line.
                "#)),
        )
        .arg(
            Arg::new("output-target")
                .long("output")
                .short('f')
                .value_name("OUT")
                .help(indoc!("
                    Writes output to the file specified instead of stdout, errors will still be printed to stderr.
                    Will ask for confirmation before overwriting files, to allow overwriting, pass `--no-confirm-overwrite`
                    Will create parent directories if needed.")),
        )
        .arg(
            Arg::new("no-confirm-overwrite")
                .long("no-confirm-overwrite")
                .action(ArgAction::SetTrue)
                .help("When set, will not ask for confirmation before overwriting files, useful for automation"),
        )
        .arg(
            Arg::new("primary-header-len")
                .long("primary-header-len")
                .default_value("6")
                .value_parser(clap::value_parser!(usize))
                .help("Length of the packet primary header in bytes."),
        )
        .arg(
            Arg::new("secondary-header-len")
                .long("secondary-header-len")
                .default_value("0")
                .value_parser(clap::value_parser!(usize))
                .help("Length of the packet secondary header in bytes."),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help(indoc!("
                    -v - info, -vv - debug, -vvv - trace
                    NOTE: trace output is only available in debug builds, as it is extremely verbose.")),
        )
}

fn main() {
    let matches = command().get_matches();

    let mut app = match EvrDump::from_cli_matches(&matches) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("{e:?}");
            exit(1)
        }
    };

    if let Err(e) = app.run() {
        eprintln!("{e:?}");
        exit(1)
    }
}

//! Scripted, in-process stand-ins for the external tools.

use std::cell::Cell;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;

use crate::sample_sheet::SampleSheet;
use crate::tools::ConvertRequest;
use crate::tools::CopyRequest;
use crate::tools::Demultiplexer;
use crate::tools::ExitCode;
use crate::tools::Lims;
use crate::tools::Notification;
use crate::tools::Notifier;
use crate::tools::StatsReport;
use crate::tools::StatsTool;
use crate::tools::Toolbox;
use crate::tools::Transfer;
use crate::tools::lims;

/// The number of reads reported by every fake demultiplexing run.
pub const READS_PER_RUN: u64 = 1000;

impl<T: Demultiplexer + ?Sized> Demultiplexer for Rc<T> {
    fn convert(&self, request: &ConvertRequest<'_>) -> io::Result<ExitCode> {
        (**self).convert(request)
    }
}

impl<T: StatsTool + ?Sized> StatsTool for Rc<T> {
    fn generate(&self, run_dir: &Path, output_dir: &Path) -> io::Result<Vec<StatsReport>> {
        (**self).generate(run_dir, output_dir)
    }
}

impl<T: Transfer + ?Sized> Transfer for Rc<T> {
    fn copy(&self, request: &CopyRequest) -> io::Result<ExitCode> {
        (**self).copy(request)
    }
}

impl<T: Lims + ?Sized> Lims for Rc<T> {
    fn sample_sheet(&self, flowcell: &str) -> lims::Result<Option<String>> {
        (**self).sample_sheet(flowcell)
    }

    fn analysis_plan(&self, project: &str) -> lims::Result<Option<String>> {
        (**self).analysis_plan(project)
    }
}

impl<T: Notifier + ?Sized> Notifier for Rc<T> {
    fn notify(&self, notification: &Notification) -> io::Result<()> {
        (**self).notify(notification)
    }
}

/// The kind of demultiplexing run a request describes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DemuxKind {
    /// A probe of the sheet as submitted.
    Forward,
    /// A probe of the reverse-complemented sheet.
    Reverse,
    /// A full conversion.
    Full,
}

/// A demultiplexing call recorded by [`FakeDemux`].
#[derive(Clone, Debug)]
pub struct DemuxCall {
    /// The kind of run.
    pub kind: DemuxKind,
    /// The output directory.
    pub output: PathBuf,
    /// The sample sheet contents at the time of the call.
    pub sheet: String,
    /// Whether only the first tile was requested.
    pub first_tile_only: bool,
}

/// A demultiplexer that writes synthetic reports with scripted undetermined
/// ratios.
#[derive(Debug)]
pub struct FakeDemux {
    /// The undetermined ratio of forward probes.
    pub forward_ratio: Cell<f64>,
    /// The undetermined ratio of reverse probes.
    pub reverse_ratio: Cell<f64>,
    /// The exit code of probes.
    pub probe_exit: Cell<ExitCode>,
    /// The exit code of full conversions.
    pub full_exit: Cell<ExitCode>,
    /// Every call, in order.
    pub calls: RefCell<Vec<DemuxCall>>,
}

impl Default for FakeDemux {
    fn default() -> Self {
        Self {
            forward_ratio: Cell::new(0.1),
            reverse_ratio: Cell::new(0.9),
            probe_exit: Cell::new(ExitCode::SUCCESS),
            full_exit: Cell::new(ExitCode::SUCCESS),
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl FakeDemux {
    /// Gets the kinds of every call, in order.
    pub fn kinds(&self) -> Vec<DemuxKind> {
        self.calls.borrow().iter().map(|call| call.kind).collect()
    }
}

/// Classifies a request by the name of the directory holding its output.
fn classify(request: &ConvertRequest<'_>) -> DemuxKind {
    let parent = request
        .output
        .parent()
        .and_then(|parent| parent.file_name())
        .and_then(|name| name.to_str());

    match parent {
        Some("forward") => DemuxKind::Forward,
        Some("reverse") => DemuxKind::Reverse,
        _ => DemuxKind::Full,
    }
}

/// Writes a demultiplexing statistics report splitting [`READS_PER_RUN`]
/// between the samples of a sheet and the undetermined bin.
fn write_stats(sheet: &SampleSheet, output: &Path, ratio: f64) -> io::Result<()> {
    let undetermined = (ratio * READS_PER_RUN as f64).round() as u64;
    let assigned = READS_PER_RUN - undetermined;
    let per_sample = assigned / sheet.samples().len() as u64;

    let mut report = String::from("Lane,SampleID,Sample_Project,Index,# Reads\n");
    for sample in sheet.samples().iter() {
        report.push_str(&format!(
            "1,{},{},{}-{},{per_sample}\n",
            sample.id(),
            sample.project(),
            sample.index(),
            sample.index2()
        ));
    }
    report.push_str(&format!("1,Undetermined,,,{undetermined}\n"));

    let reports = output.join("Reports");
    fs::create_dir_all(&reports)?;
    fs::write(reports.join("Demultiplex_Stats.csv"), report)?;
    fs::write(
        reports.join("Quality_Metrics.csv"),
        "Lane,SampleID,Mean Quality Score (PF)\n1,Undetermined,30.1\n",
    )
}

/// Writes one read file per sample, grouped by project, plus the
/// undetermined reads.
fn write_reads(sheet: &SampleSheet, output: &Path) -> io::Result<()> {
    for (i, sample) in sheet.samples().iter().enumerate() {
        let dir = output.join(sample.project());
        fs::create_dir_all(&dir)?;
        fs::write(
            dir.join(format!("{}_S{}_L001_R1_001.fastq.gz", sample.id(), i + 1)),
            sample.id(),
        )?;
    }

    fs::write(output.join("Undetermined_S0_L001_R1_001.fastq.gz"), b"")
}

impl Demultiplexer for FakeDemux {
    fn convert(&self, request: &ConvertRequest<'_>) -> io::Result<ExitCode> {
        let contents = fs::read_to_string(request.sample_sheet)?;
        let sheet = contents
            .parse::<SampleSheet>()
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err.to_string()))?;
        let kind = classify(request);

        self.calls.borrow_mut().push(DemuxCall {
            kind,
            output: request.output.to_path_buf(),
            sheet: contents,
            first_tile_only: request.first_tile_only,
        });

        let (exit, ratio) = match kind {
            DemuxKind::Forward => (self.probe_exit.get(), self.forward_ratio.get()),
            DemuxKind::Reverse => (self.probe_exit.get(), self.reverse_ratio.get()),
            DemuxKind::Full => (self.full_exit.get(), self.forward_ratio.get()),
        };

        if !exit.success() {
            return Ok(exit);
        }

        fs::create_dir_all(request.output)?;
        write_stats(&sheet, request.output, ratio)?;

        if kind == DemuxKind::Full {
            write_reads(&sheet, request.output)?;
        }

        Ok(exit)
    }
}

/// A statistics tool that writes one small file per report.
#[derive(Debug)]
pub struct FakeStats {
    /// The report names, with their scripted exit codes.
    pub reports: Vec<(String, ExitCode)>,
    /// The number of times reports were generated.
    pub calls: Cell<usize>,
}

impl Default for FakeStats {
    fn default() -> Self {
        let reports = [
            "summary",
            "index-summary",
            "plot_by_cycle",
            "plot_by_lane",
            "plot_flowcell",
            "plot_qscore_histogram",
            "plot_qscore_heatmap",
        ]
        .into_iter()
        .map(|name| (name.to_string(), ExitCode::SUCCESS))
        .collect();

        Self {
            reports,
            calls: Cell::new(0),
        }
    }
}

impl FakeStats {
    /// Scripts a failing exit code for the named report.
    pub fn failing(name: &str, code: i32) -> Self {
        let mut stats = Self::default();

        for (report, exit) in stats.reports.iter_mut() {
            if report == name {
                *exit = ExitCode::new(code);
            }
        }

        stats
    }
}

impl StatsTool for FakeStats {
    fn generate(&self, _: &Path, output_dir: &Path) -> io::Result<Vec<StatsReport>> {
        self.calls.set(self.calls.get() + 1);
        fs::create_dir_all(output_dir)?;

        self.reports
            .iter()
            .map(|(name, exit)| {
                let path = output_dir.join(format!("{name}.txt"));
                fs::write(&path, name)?;

                Ok(StatsReport {
                    name: name.clone(),
                    path,
                    exit: *exit,
                })
            })
            .collect()
    }
}

/// A copy primitive that records requests and returns a scripted exit code.
#[derive(Debug)]
pub struct FakeTransfer {
    /// The exit code returned by every copy.
    pub exit: Cell<ExitCode>,
    /// Every request, in order.
    pub requests: RefCell<Vec<CopyRequest>>,
}

impl Default for FakeTransfer {
    fn default() -> Self {
        Self {
            exit: Cell::new(ExitCode::SUCCESS),
            requests: RefCell::new(Vec::new()),
        }
    }
}

impl Transfer for FakeTransfer {
    fn copy(&self, request: &CopyRequest) -> io::Result<ExitCode> {
        self.requests.borrow_mut().push(request.clone());
        Ok(self.exit.get())
    }
}

/// A LIMS backed by in-memory maps.
#[derive(Debug, Default)]
pub struct FakeLims {
    /// Sample sheets by flow cell.
    pub sheets: HashMap<String, String>,
    /// Analysis plans by project.
    pub plans: HashMap<String, String>,
    /// Whether every lookup fails as if the LIMS were down.
    pub unavailable: Cell<bool>,
}

impl FakeLims {
    fn lookup(&self, table: &HashMap<String, String>, key: &str) -> lims::Result<Option<String>> {
        if self.unavailable.get() {
            return Err(lims::Error::Status(
                reqwest::StatusCode::SERVICE_UNAVAILABLE,
                format!("http://lims.invalid/{key}"),
            ));
        }

        Ok(table.get(key).cloned())
    }
}

impl Lims for FakeLims {
    fn sample_sheet(&self, flowcell: &str) -> lims::Result<Option<String>> {
        self.lookup(&self.sheets, flowcell)
    }

    fn analysis_plan(&self, project: &str) -> lims::Result<Option<String>> {
        self.lookup(&self.plans, project)
    }
}

/// A notifier that records every notification.
#[derive(Debug, Default)]
pub struct FakeNotifier {
    /// Every notification, in order, including the ones that failed.
    pub sent: RefCell<Vec<Notification>>,
    /// Whether every send fails after being recorded.
    pub unavailable: Cell<bool>,
}

impl Notifier for FakeNotifier {
    fn notify(&self, notification: &Notification) -> io::Result<()> {
        self.sent.borrow_mut().push(notification.clone());

        if self.unavailable.get() {
            return Err(io::Error::other("mail transport unavailable"));
        }

        Ok(())
    }
}

/// Handles onto the fakes within a [`Toolbox`].
#[derive(Debug, Default)]
pub struct Fakes {
    /// The demultiplexer.
    pub demux: Rc<FakeDemux>,
    /// The statistics tool.
    pub stats: Rc<FakeStats>,
    /// The cloud-share copy primitive.
    pub cloud: Rc<FakeTransfer>,
    /// The HPC copy primitive.
    pub hpc: Rc<FakeTransfer>,
    /// The archive copy primitive.
    pub archive: Rc<FakeTransfer>,
    /// The LIMS.
    pub lims: Rc<FakeLims>,
    /// The notifier.
    pub notifier: Rc<FakeNotifier>,
}

impl Fakes {
    /// Builds a toolbox sharing these fakes.
    pub fn toolbox(&self) -> Toolbox {
        Toolbox {
            demultiplexer: Box::new(self.demux.clone()),
            stats: Box::new(self.stats.clone()),
            cloud: Box::new(self.cloud.clone()),
            hpc: Box::new(self.hpc.clone()),
            archive: Box::new(self.archive.clone()),
            lims: Box::new(self.lims.clone()),
            notifier: Box::new(self.notifier.clone()),
        }
    }
}

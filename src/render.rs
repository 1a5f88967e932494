//! Human-readable rendering of decoded PE structures

use log::warn;
use rupe_decoder::{
    CoffHeader, DataDirectories, DosHeader, HeaderChain, ImportedFunction, ImportedLibrary,
    OptionalHeader, PeError, PeFile, SectionHeader,
};

use crate::config::DisplayConfig;

const RULE_WIDTH: usize = 63;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Render every structure of a fully decoded image.
pub fn render(pe: &PeFile, display: &DisplayConfig) -> String {
    let mut output = String::new();

    if display.show_dos_header {
        output.push_str(&format_dos_header(pe.dos()));
    }
    output.push_str(&format_coff_header(pe.coff()));
    output.push_str(&format_optional_header(pe.optional()));
    if display.show_data_directories {
        output.push_str(&format_data_directories(
            pe.data_directories(),
            display.show_empty_directories,
        ));
    }
    if display.show_sections {
        output.push_str(&format_section_table(
            pe.sections(),
            pe.data(),
            display.show_section_flags,
        ));
    }
    if display.show_imports {
        match pe.imported_libraries() {
            Ok(libs) => output.push_str(&format_import_table(&libs, display)),
            Err(e) => {
                warn!("Import table could not be decoded: {}", e);
                output.push_str(&format_import_error(&e));
            }
        }
    }

    output
}

/// Render whatever the header chain managed to decode before it failed.
pub fn render_partial(chain: &HeaderChain, data: &[u8], display: &DisplayConfig) -> String {
    let mut output = String::new();

    if let Some(dos) = &chain.dos
        && display.show_dos_header
    {
        output.push_str(&format_dos_header(dos));
    }
    if let Some(coff) = &chain.coff {
        output.push_str(&format_coff_header(coff));
    }
    if let Some(opt) = &chain.optional {
        output.push_str(&format_optional_header(opt));
        if display.show_data_directories {
            output.push_str(&format_data_directories(
                &opt.data_directories,
                display.show_empty_directories,
            ));
        }
    }
    if let Some(sections) = &chain.sections
        && display.show_sections
    {
        output.push_str(&format_section_table(
            sections,
            data,
            display.show_section_flags,
        ));
    }

    output
}

// ---------------------------------------------------------------------------
// Rendering: DOS header
// ---------------------------------------------------------------------------

fn format_dos_header(dos: &DosHeader) -> String {
    let mut o = banner("DOS HEADER");

    o.push_str(&format!(
        "  Signature:        {}\n",
        String::from_utf8_lossy(&dos.signature)
    ));
    let words = [
        ("Last page size", dos.last_page_size),
        ("Pages in file", dos.file_num_pages),
        ("Relocations", dos.num_reloc_items),
        ("Header paragraphs", dos.header_num_paragraphs),
        ("Min extra paras", dos.min_extra_paragraphs),
        ("Max extra paras", dos.max_extra_paragraphs),
        ("Initial SS", dos.initial_rel_ss),
        ("Initial SP", dos.initial_sp),
        ("Checksum", dos.checksum),
        ("Initial IP", dos.initial_ip),
        ("Initial CS", dos.initial_rel_cs),
        ("Reloc table", dos.reloc_tbl_address),
        ("Overlay", dos.overlay_num),
        ("OEM id", dos.oem_id),
        ("OEM info", dos.oem_info),
    ];
    for (label, value) in words {
        o.push_str(&format!("  {:<18}0x{:04X}\n", format!("{}:", label), value));
    }
    o.push_str(&format!("  PE offset:        0x{:08X}\n", dos.pe_offset));

    o.push('\n');
    o
}

// ---------------------------------------------------------------------------
// Rendering: COFF header
// ---------------------------------------------------------------------------

fn format_coff_header(coff: &CoffHeader) -> String {
    let mut o = banner("PE IMAGE FILE HEADER (COFF)");

    o.push_str(&format!("  Type:         {}\n", pe_type_str(coff)));
    o.push_str(&format!(
        "  Machine:      {} (0x{:04X})\n",
        coff.machine,
        coff.machine.code()
    ));
    o.push_str(&format!("  Sections:     {}\n", coff.number_of_sections));
    o.push_str(&format!(
        "  Timestamp:    {}\n",
        format_timestamp(coff.time_date_stamp)
    ));
    o.push_str(&format!(
        "  Symbol table: 0x{:08X} ({} symbols)\n",
        coff.pointer_to_symbol_table, coff.number_of_symbols
    ));
    o.push_str(&format!("  Opt hdr size: {}\n", coff.size_of_opt_header));
    o.push_str(&format!(
        "  Flags:        0x{:04X} {}\n",
        coff.characteristics,
        join_flags(&coff.characteristic_names())
    ));

    o.push('\n');
    o
}

fn pe_type_str(coff: &CoffHeader) -> &'static str {
    if coff.is_dll() {
        "DLL (Dynamic Link Library)"
    } else if coff.is_executable() {
        "EXE (Executable)"
    } else {
        "Unknown"
    }
}

// ---------------------------------------------------------------------------
// Rendering: Optional header
// ---------------------------------------------------------------------------

fn format_optional_header(opt: &OptionalHeader) -> String {
    let mut o = banner("PE OPTIONAL HEADER");

    o.push_str(&format!(
        "  Format:       {} (magic 0x{:03X})\n",
        if opt.is_pe32plus() {
            "PE32+ (64-bit)"
        } else {
            "PE32 (32-bit)"
        },
        opt.magic
    ));
    o.push_str(&format!(
        "  Linker:       {}.{}\n",
        opt.major_linker_version, opt.minor_linker_version
    ));
    o.push_str(&format!(
        "  Code size:    {}\n",
        format_size_commas(opt.size_of_code as u64)
    ));
    o.push_str(&format!(
        "  Init data:    {}\n",
        format_size_commas(opt.size_of_initialized_data as u64)
    ));
    o.push_str(&format!(
        "  Uninit data:  {}\n",
        format_size_commas(opt.size_of_uninitialized_data as u64)
    ));
    o.push_str(&format!(
        "  Entry point:  0x{:08X}\n",
        opt.address_of_entry_point
    ));
    o.push_str(&format!("  Code base:    0x{:08X}\n", opt.base_of_code));
    if let Some(base_of_data) = opt.base_of_data {
        o.push_str(&format!("  Data base:    0x{:08X}\n", base_of_data));
    }
    o.push_str(&format!(
        "  Image base:   0x{:0width$X}\n",
        opt.image_base,
        width = hex_width(opt.image_base)
    ));
    o.push_str(&format!("  Sect align:   0x{:X}\n", opt.section_alignment));
    o.push_str(&format!("  File align:   0x{:X}\n", opt.file_alignment));
    o.push_str(&format!(
        "  OS version:   {}.{}\n",
        opt.major_operating_system_version, opt.minor_operating_system_version
    ));
    o.push_str(&format!(
        "  Image ver:    {}.{}\n",
        opt.major_image_version, opt.minor_image_version
    ));
    o.push_str(&format!(
        "  Subsys ver:   {}.{}\n",
        opt.major_subsystem_version, opt.minor_subsystem_version
    ));
    o.push_str(&format!(
        "  Image size:   {}\n",
        human_size(opt.size_of_image as u64)
    ));
    o.push_str(&format!("  Headers size: 0x{:X}\n", opt.size_of_headers));
    o.push_str(&format!("  Checksum:     0x{:08X}\n", opt.check_sum));
    o.push_str(&format!(
        "  Subsystem:    {} ({})\n",
        opt.subsystem,
        opt.subsystem.code()
    ));
    o.push_str(&format!(
        "  DLL Chars:    {}\n",
        join_flags(&opt.dll_characteristic_names())
    ));
    o.push_str(&format!(
        "  Stack:        0x{:X} reserve, 0x{:X} commit\n",
        opt.size_of_stack_reserve, opt.size_of_stack_commit
    ));
    o.push_str(&format!(
        "  Heap:         0x{:X} reserve, 0x{:X} commit\n",
        opt.size_of_heap_reserve, opt.size_of_heap_commit
    ));
    o.push_str(&format!("  Loader flags: 0x{:08X}\n", opt.loader_flags));
    o.push_str(&format!(
        "  Directories:  {} declared\n",
        opt.number_of_rva_and_sizes
    ));

    o.push('\n');
    o
}

// ---------------------------------------------------------------------------
// Rendering: Data Directories
// ---------------------------------------------------------------------------

fn format_data_directories(dirs: &DataDirectories, show_empty: bool) -> String {
    let mut o = banner("DATA DIRECTORIES");

    o.push_str("  [Nr] Directory                  RVA        Size\n");
    o.push_str("  ---- ---------                  ---        ----\n");

    for (kind, dd) in dirs.iter() {
        if !show_empty && !dd.is_present() {
            continue;
        }
        o.push_str(&format!(
            "  [{:>2}] {:<26} {:08X}   {:08X}\n",
            kind.index(),
            kind.name(),
            dd.virtual_address,
            dd.size,
        ));
    }

    o.push('\n');
    o
}

// ---------------------------------------------------------------------------
// Rendering: Section Headers
// ---------------------------------------------------------------------------

fn format_section_table(sections: &[SectionHeader], data: &[u8], show_flags: bool) -> String {
    let mut o = banner("SECTION HEADERS");

    if sections.is_empty() {
        o.push_str("  (no sections)\n\n");
        return o;
    }

    o.push_str("  [Nr] Name       VirtSize VirtAddr   RawSize  RawAddr    Entropy  Perm\n");
    o.push_str("  ---- ----       -------- --------   -------  -------    -------  ----\n");

    for (i, sh) in sections.iter().enumerate() {
        let entropy = match raw_section_bytes(sh, data) {
            Some(bytes) if !bytes.is_empty() => format!("{:.2}", shannon_entropy(bytes)),
            _ => "  -  ".into(),
        };
        o.push_str(&format!(
            "  [{:>2}] {:<10} {:08X} {:08X}   {:08X} {:08X}   {:>5}  {}\n",
            i,
            sh.name_str(),
            sh.virtual_size,
            sh.virtual_address,
            sh.size_of_raw_data,
            sh.pointer_to_raw_data,
            entropy,
            section_perm_str(sh),
        ));
        if show_flags {
            let align = sh.alignment().map(|a| format!("ALIGN_{}BYTES", a));
            let mut flags: Vec<&str> = sh.flag_names();
            if let Some(a) = &align {
                flags.push(a);
            }
            o.push_str(&format!(
                "       0x{:08X} {}\n",
                sh.characteristics,
                join_flags(&flags)
            ));
        }
    }

    o.push('\n');
    o
}

/// Raw bytes of a section, or `None` when its file range runs past the data.
fn raw_section_bytes<'a>(sh: &SectionHeader, data: &'a [u8]) -> Option<&'a [u8]> {
    let start = sh.pointer_to_raw_data as usize;
    let end = start.checked_add(sh.size_of_raw_data as usize)?;
    data.get(start..end)
}

fn section_perm_str(sh: &SectionHeader) -> String {
    let c = sh.characteristics;
    let mut s = String::with_capacity(3);
    s.push(if c & 0x4000_0000 != 0 { 'R' } else { '-' });
    s.push(if c & 0x8000_0000 != 0 { 'W' } else { '-' });
    s.push(if c & 0x2000_0000 != 0 { 'X' } else { '-' });
    s
}

// ---------------------------------------------------------------------------
// Rendering: Import Table
// ---------------------------------------------------------------------------

fn format_import_table(imports: &[ImportedLibrary], display: &DisplayConfig) -> String {
    let mut o = banner("IMPORT TABLE");

    if imports.is_empty() {
        o.push_str("  (no imports)\n\n");
        return o;
    }

    for lib in imports {
        let count = lib.functions.len();
        o.push_str(&format!(
            "  {} ({} functions)  ILT 0x{:08X}  IAT 0x{:08X}\n",
            lib.name, count, lib.descriptor.orig_first_thunk, lib.descriptor.first_thunk
        ));
        if !display.show_import_functions {
            continue;
        }
        let limit = match display.max_functions_per_dll {
            0 => count,
            n => n.min(count),
        };
        for func in &lib.functions[..limit] {
            o.push_str(&format!("    {}\n", format_function(func)));
        }
        if limit < count {
            o.push_str(&format!("    ... {} more\n", count - limit));
        }
        o.push('\n');
    }

    o
}

fn format_function(func: &ImportedFunction) -> String {
    match func {
        ImportedFunction::ByName { hint, name } => format!("{:<40} (hint {})", name, hint),
        ImportedFunction::ByOrdinal(ord) => format!("Ordinal {}", ord),
        ImportedFunction::Unresolved { rva } => format!("(RVA 0x{:08X})", rva),
    }
}

fn format_import_error(err: &PeError) -> String {
    let mut o = banner("IMPORT TABLE");
    o.push_str(&format!("  Could not decode: {}\n\n", err));
    o
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

fn banner(title: &str) -> String {
    let rule = "═".repeat(RULE_WIDTH);
    let pad = RULE_WIDTH.saturating_sub(title.len()) / 2;
    format!("{}\n{}{}\n{}\n\n", rule, " ".repeat(pad), title, rule)
}

fn join_flags(flags: &[&str]) -> String {
    if flags.is_empty() {
        String::from("(none)")
    } else {
        flags.join(" | ")
    }
}

/// Compute Shannon entropy of a byte slice (0.0 = uniform, 8.0 = max random)
fn shannon_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut counts = [0u64; 256];
    for &b in data {
        counts[b as usize] += 1;
    }
    let len = data.len() as f64;
    let mut entropy = 0.0;
    for &c in &counts {
        if c > 0 {
            let p = c as f64 / len;
            entropy -= p * p.log2();
        }
    }
    entropy
}

pub fn human_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 * 1024 {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    } else if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}

fn format_size_commas(n: u64) -> String {
    let s = n.to_string();
    let bytes = s.as_bytes();
    let len = bytes.len();
    let mut result = String::new();
    for (i, &b) in bytes.iter().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            result.push(',');
        }
        result.push(b as char);
    }
    format!("{} B", result)
}

fn format_timestamp(timestamp: u32) -> String {
    if timestamp == 0 {
        return String::from("(not set)");
    }
    let secs = timestamp as u64;
    let days = secs / 86400;
    let time_of_day = secs % 86400;
    let hours = time_of_day / 3600;
    let minutes = (time_of_day % 3600) / 60;
    let seconds = time_of_day % 60;

    let (year, month, day) = days_to_date(days);

    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02} UTC",
        year, month, day, hours, minutes, seconds
    )
}

fn days_to_date(days: u64) -> (u64, u64, u64) {
    // Algorithm from http://howardhinnant.github.io/date_algorithms.html
    let z = days + 719468;
    let era = z / 146097;
    let doe = z - era * 146097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}

/// Minimum hex digit width needed for a value (at least 8)
fn hex_width(val: u64) -> usize {
    if val > 0xFFFF_FFFF { 16 } else { 8 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "(not set)");
        assert_eq!(format_timestamp(86400), "1970-01-02 00:00:00 UTC");
        assert_eq!(format_timestamp(0x4A5B_C60F), "2009-07-13 23:41:03 UTC");
    }

    #[test]
    fn test_size_formatting() {
        assert_eq!(format_size_commas(1234567), "1,234,567 B");
        assert_eq!(format_size_commas(512), "512 B");
        assert_eq!(human_size(2048), "2.0 KB");
        assert_eq!(human_size(10), "10 B");
    }

    #[test]
    fn test_entropy_bounds() {
        assert_eq!(shannon_entropy(&[0u8; 64]), 0.0);
        let all: Vec<u8> = (0..=255u8).collect();
        assert!((shannon_entropy(&all) - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_banner_centers_title() {
        let b = banner("DATA DIRECTORIES");
        let lines: Vec<&str> = b.lines().collect();
        assert_eq!(lines[0].chars().count(), RULE_WIDTH);
        assert_eq!(lines[1], format!("{}DATA DIRECTORIES", " ".repeat(23)));
    }

    #[test]
    fn test_join_flags() {
        assert_eq!(join_flags(&[]), "(none)");
        assert_eq!(join_flags(&["DLL", "SYSTEM"]), "DLL | SYSTEM");
    }

    #[test]
    fn test_format_function() {
        assert_eq!(format_function(&ImportedFunction::ByOrdinal(12)), "Ordinal 12");
        assert!(format_function(&ImportedFunction::ByName {
            hint: 5,
            name: "Sleep".into()
        })
        .starts_with("Sleep "));
    }

    #[test]
    fn test_render_partial_without_headers() {
        let chain = HeaderChain::default();
        assert!(render_partial(&chain, &[], &DisplayConfig::default()).is_empty());
    }

    #[test]
    fn test_raw_section_bytes_bounds() {
        let mut sh = SectionHeader {
            name: *b".text\0\0\0",
            virtual_size: 0x10,
            virtual_address: 0x1000,
            size_of_raw_data: 4,
            pointer_to_raw_data: 2,
            pointer_to_relocations: 0,
            pointer_to_line_numbers: 0,
            num_of_relocations: 0,
            num_of_line_numbers: 0,
            characteristics: 0x6000_0020,
        };
        let data = [0u8, 1, 2, 3, 4, 5, 6];
        assert_eq!(raw_section_bytes(&sh, &data), Some(&data[2..6]));
        assert_eq!(section_perm_str(&sh), "R-X");
        sh.size_of_raw_data = 0x100;
        assert_eq!(raw_section_bytes(&sh, &data), None);
    }
}

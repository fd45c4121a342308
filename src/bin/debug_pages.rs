use pdf_analyzer::extractor::extract_page_layout;
use pdf_analyzer::{PageRange, SourceDocument};
use std::env;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: debug_pages <pdf_path> [page | start-end]");
        std::process::exit(1);
    }

    let range: PageRange = match args.get(2).map(|s| s.parse()).unwrap_or(Ok(PageRange::default())) {
        Ok(range) => range,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let source = match SourceDocument::open(&args[1]) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Failed to open {}: {}", args[1], e);
            std::process::exit(1);
        }
    };

    for page in range.pages() {
        let layout = match extract_page_layout(source.document(), page) {
            Ok(layout) => layout,
            Err(e) => {
                println!("=== PAGE {} ({}) ===\n", page, e);
                continue;
            }
        };

        println!(
            "=== PAGE {} ({} items, {} rulings) ===",
            page,
            layout.items.len(),
            layout.rulings.len()
        );
        for item in &layout.items {
            println!(
                "  x={:7.1} y={:7.1} w={:7.1} font={:<6} fs={:5.1} text={:?}",
                item.x, item.y, item.width, item.font, item.font_size, item.text
            );
        }
        for ruling in &layout.rulings {
            let kind = if ruling.is_horizontal() { "H" } else { "V" };
            println!(
                "  {} ({:7.1},{:7.1}) -> ({:7.1},{:7.1})",
                kind, ruling.x0, ruling.y0, ruling.x1, ruling.y1
            );
        }
        println!();
    }
}

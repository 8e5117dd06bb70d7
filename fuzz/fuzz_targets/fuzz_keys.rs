#![no_main]

use std::time::{Duration, Instant};

use feedkeys::Extension;
use feedkeys::config::Config;
use feedkeys::dom::{APP_ROOT, FEED_ITEM, FEED_TABS, feed_content_selector};
use feedkeys::keys::{KeyPress, Modifiers};
use feedkeys::page::{ElementSpec, MemoryPage};
use libfuzzer_sys::fuzz_target;

const KEYS: [&str; 16] = [
    "j", "k", "l", "r", "f", "F", "o", "/", "p", "g", "n", "?", "x", "Enter", "Escape", "G",
];
const TABS: usize = 3;

fn page() -> MemoryPage {
    let mut page = MemoryPage::new();
    page.add(ElementSpec::new("root").selector(APP_ROOT));
    let mut bar = ElementSpec::new("tabbar").selector(FEED_TABS);
    for i in 0..TABS {
        let mut label = ElementSpec::new(format!("tab{i}-label"));
        if i == 1 {
            label = label.style("border-bottom-color", "blue");
        }
        bar = bar.child(ElementSpec::new(format!("tab{i}")).child(label));
    }
    page.add(bar);
    for i in 0..TABS {
        page.add(
            ElementSpec::new(format!("feed{i}"))
                .selector(&feed_content_selector(i))
                .detached()
                .child(ElementSpec::new(format!("feed{i}-post")).selector(FEED_ITEM)),
        );
    }
    page.add(ElementSpec::new("post").selector(FEED_ITEM));
    page.add(ElementSpec::new("compose").tag("textarea"));
    page
}

// Each input byte pair is one step: the first byte picks a key (or a page
// mutation) and its modifiers, the second how far the clock moves before it.
fuzz_target!(|data: &[u8]| {
    let mut page = page();
    let t0 = Instant::now();
    let mut now = t0;
    let mut ext = Extension::start(&Config::default(), &mut page, t0);

    for pair in data.chunks_exact(2) {
        let (op, delta) = (pair[0], pair[1]);
        now += Duration::from_millis(u64::from(delta) * 4);
        ext.tick(&mut page, now);

        match op >> 5 {
            0..=4 => {
                let modifiers = Modifiers {
                    shift: op >> 5 == 1,
                    ctrl: op >> 5 == 2,
                    ..Modifiers::NONE
                };
                let key = KeyPress::with_modifiers(KEYS[usize::from(op & 0x0f)], modifiers);
                ext.handle_key(&key, &mut page, now);
            }
            5 => {
                let feed = page.find(&format!("feed{}", op as usize % TABS));
                if let Some(el) = feed {
                    if op & 0x10 == 0 {
                        page.attach(el);
                    } else {
                        page.detach(el);
                    }
                }
            }
            6 => {
                let compose = page.find("compose");
                page.set_focus(if op & 1 == 0 { compose } else { None });
            }
            _ => {
                let post = page.find("post");
                if let Some(el) = post {
                    page.set_rendered(el, op & 1 == 0);
                }
            }
        }

        if let Some(index) = ext.feed_index() {
            assert!(index < ext.feed_tab_count(), "feed index {index} out of range");
        }
        page.take_events();
    }
});

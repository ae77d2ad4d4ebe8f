use std::time::Duration;

use barwire::{
    tools::home,
    widgets::{
        battery::BatteryWidget,
        bspwm::{BspwmColors, BspwmDesktopWidget, CellStyle},
        clock::ClockWidget,
        player::PlayerWidget,
        xorg::ActiveWindowWidget,
        WidgetStyle,
    },
    Alignment, Panel, PanelConfig, Screen, ScreenConfig,
};

fn setup_logger() {
    let log_file = format!("{}/.barwire.log", home());

    simplelog::WriteLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        std::fs::File::create(log_file).expect("Failed to create log file"),
    )
    .expect("Failed to initialize logger");

    std::panic::set_hook(Box::new(|info| {
        tracing::error!("{}", info);
    }));
}

fn main() -> barwire::Result<()> {
    setup_logger();

    let failure_refresh = Duration::from_secs(5);
    let text_style = WidgetStyle {
        fg: Some("#EBDBB2".to_string()),
        padding: 1,
        ..WidgetStyle::default()
    };

    let desktops = BspwmDesktopWidget::new(
        WidgetStyle::default(),
        BspwmColors {
            focused_occupied: CellStyle {
                fg: Some("#282828".to_string()),
                bg: Some("#CC241D".to_string()),
            },
            focused_free: CellStyle {
                fg: Some("#282828".to_string()),
                bg: Some("#CC241D".to_string()),
            },
            urgent: CellStyle {
                fg: Some("#282828".to_string()),
                bg: Some("#D79921".to_string()),
            },
            ..BspwmColors::default()
        },
        failure_refresh,
    );

    let screen = Screen::new(ScreenConfig {
        height: 24,
        fonts: vec!["JetBrains Mono:size=11".to_string()],
        bg: Some("#282828".to_string()),
        fg: Some("#EBDBB2".to_string()),
        clickable: Some(20),
        ..ScreenConfig::default()
    });

    screen.add_widget(Alignment::Left, desktops);
    screen.add_widget(
        Alignment::Left,
        ActiveWindowWidget::new(text_style.clone(), Some(80), failure_refresh),
    );
    screen.add_widget(
        Alignment::Center,
        PlayerWidget::new(text_style.clone(), Duration::from_secs(1)),
    );
    screen.add_widget(
        Alignment::Right,
        BatteryWidget::new(text_style.clone(), Duration::from_secs(30)),
    );
    screen.add_widget(
        Alignment::Right,
        ClockWidget::new("%a %d %b %H:%M", text_style, Duration::from_secs(10)),
    );

    let panel = Panel::new(PanelConfig::default());
    panel.add_screen(&screen);
    panel.start()
}

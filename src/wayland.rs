// Wayland integration module
// Opens the comparison window and drives the session from keyboard events

use crate::app::{Mode, Session};
use crate::catalog::ImageSet;
use crate::image_loader::{load_row, ImageData};
use crate::render::{calculate_limited_size, compose_row, framed_panels, natural_row_size};
use anyhow::{Context, Result};
use log::{debug, error, info};
use smithay_client_toolkit::{
    compositor::{CompositorHandler, CompositorState},
    delegate_compositor, delegate_keyboard, delegate_output, delegate_registry, delegate_seat,
    delegate_shm, delegate_xdg_shell, delegate_xdg_window,
    output::{OutputHandler, OutputState},
    registry::{ProvidesRegistryState, RegistryState},
    registry_handlers,
    seat::{
        keyboard::{KeyEvent, KeyboardHandler, Keysym, Modifiers},
        Capability, SeatHandler, SeatState,
    },
    shell::{
        xdg::{
            window::{Window, WindowConfigure, WindowDecorations, WindowHandler},
            XdgShell,
        },
        WaylandSurface,
    },
    shm::{
        slot::{Buffer, SlotPool},
        Shm, ShmHandler,
    },
};
use wayland_client::{
    globals::registry_queue_init,
    protocol::{wl_keyboard, wl_output, wl_seat, wl_shm, wl_surface},
    Connection, QueueHandle,
};

/// Minimum window size
const MIN_SIZE: u32 = 100;

/// Maximum window size to prevent buffer allocation failures
const MAX_SIZE: u32 = 8192;

/// Maximum buffer size (256MB to avoid Wayland buffer issues)
const MAX_BUFFER_SIZE: usize = 256 * 1024 * 1024;

/// Share of the screen area the initial window may cover
const MAX_SCREEN_FRACTION: f32 = 0.64;

const APP_ID: &str = "imgcmp";

/// Decoded images of one index, reused across redraws that do not move the index
struct PanelCache {
    index: usize,
    images: Vec<Option<ImageData>>,
}

/// Main Wayland application state
struct WaylandApp {
    // Registry state
    registry_state: RegistryState,
    // Seat state for input handling
    seat_state: SeatState,
    // Output state for display info
    output_state: OutputState,
    // Shared memory for buffer allocation
    shm: Shm,
    // xdg-shell for the toplevel window
    xdg_shell: XdgShell,
    // Compositor state
    compositor_state: CompositorState,

    // Application-specific state
    images: ImageSet,
    session: Session,
    panels: Option<PanelCache>,
    closed: bool,

    // Surface and buffer management
    window: Option<Window>,
    pool: Option<SlotPool>,
    buffer: Option<Buffer>,
    width: u32,
    height: u32,
    configured: bool,

    // Redraw bookkeeping
    redraw: RedrawState,
}

/// Tracks a redraw that has not reached the screen yet.
///
/// A failed render keeps the redraw pending and asks for one frame callback;
/// the callback renders again.
#[derive(Debug, Default)]
struct RedrawState {
    pending: bool,
    frame_requested: bool,
}

impl RedrawState {
    fn request(&mut self) {
        self.pending = true;
    }

    /// Record a render attempt; returns whether a frame callback must be requested
    fn finish(&mut self, presented: bool) -> bool {
        self.pending = !presented;
        if self.pending && !self.frame_requested {
            self.frame_requested = true;
            return true;
        }
        false
    }

    /// A frame callback fired; returns whether to render again
    fn frame_done(&mut self) -> bool {
        self.frame_requested = false;
        self.pending
    }
}

impl WaylandApp {
    /// Create a new Wayland application
    fn new(
        registry_state: RegistryState,
        seat_state: SeatState,
        output_state: OutputState,
        shm: Shm,
        xdg_shell: XdgShell,
        compositor_state: CompositorState,
        images: ImageSet,
        session: Session,
    ) -> Self {
        Self {
            registry_state,
            seat_state,
            output_state,
            shm,
            xdg_shell,
            compositor_state,
            images,
            session,
            panels: None,
            closed: false,
            window: None,
            pool: None,
            buffer: None,
            width: 0,
            height: 0,
            configured: false,
            redraw: RedrawState::default(),
        }
    }

    fn should_exit(&self) -> bool {
        self.closed || self.session.exit_requested()
    }

    /// Decoded images for the current index, loading them on first use
    fn current_images(&mut self) -> &[Option<ImageData>] {
        let index = self.session.index();
        let stale = self.panels.as_ref().map_or(true, |cache| cache.index != index);
        if stale {
            debug!("Loading images at index {}", index);
            self.panels = Some(PanelCache {
                index,
                images: load_row(&self.images, index),
            });
        }
        match &self.panels {
            Some(cache) => &cache.images,
            None => &[],
        }
    }

    /// Feed a key to the session and re-render when the transition asks for it
    fn handle_key(&mut self, key: &str, qh: &QueueHandle<Self>) {
        let transition = self.session.clone().dispatch(key);
        self.session = transition.session;

        if self.session.exit_requested() {
            info!("Exit key pressed");
            return;
        }

        if transition.redraw {
            debug!(
                "Index {} / {}, {} marked",
                self.session.index() + 1,
                self.session.len(),
                self.session.marks().count()
            );
            self.update_title();
            self.redraw.request();
            self.draw(qh);
        }
    }

    fn update_title(&self) {
        if let Some(ref window) = self.window {
            window.set_title(window_title(&self.session));
        }
    }

    /// Render the current index, retrying on the next frame when that fails
    fn draw(&mut self, qh: &QueueHandle<Self>) {
        // configure renders once the window is mapped
        if !self.configured {
            return;
        }

        let presented = self.present();
        if self.redraw.finish(presented) {
            self.request_frame(qh);
        }
    }

    fn request_frame(&self, qh: &QueueHandle<Self>) {
        if let Some(ref window) = self.window {
            debug!("Render failed, retrying on the next frame");
            let surface = window.wl_surface();
            surface.frame(qh, surface.clone());
            surface.commit();
        }
    }

    /// Render the panels of the current index to the surface buffer.
    ///
    /// Returns whether a new buffer was committed.
    fn present(&mut self) -> bool {
        if self.window.is_none() {
            return false;
        }

        self.width = self.width.clamp(MIN_SIZE, MAX_SIZE);
        self.height = self.height.clamp(MIN_SIZE, MAX_SIZE);

        let width = self.width;
        let height = self.height;

        // Calculate buffer size (4 bytes per pixel for ARGB)
        let stride = width as i32 * 4;
        let buffer_size = (stride * height as i32) as usize;

        if buffer_size > MAX_BUFFER_SIZE {
            error!("Buffer size too large: {} bytes, max: {} bytes", buffer_size, MAX_BUFFER_SIZE);
            return false;
        }

        // Gather panels before borrowing the pool
        let session = self.session.clone();
        let panels = framed_panels(self.current_images(), &session);

        // Initialize pool if needed
        if self.pool.is_none() {
            match SlotPool::new(buffer_size, &self.shm) {
                Ok(pool) => self.pool = Some(pool),
                Err(e) => {
                    error!("Failed to create slot pool: {}. Buffer size: {} bytes", e, buffer_size);
                    return false;
                }
            }
        }

        let Some(pool) = self.pool.as_mut() else {
            return false;
        };

        // Resize pool if needed
        if pool.len() < buffer_size {
            if let Err(e) = pool.resize(buffer_size) {
                error!("Failed to resize pool to {} bytes: {}", buffer_size, e);
                self.pool = None;
                return false;
            }
        }

        let (buffer, canvas) =
            match pool.create_buffer(width as i32, height as i32, stride, wl_shm::Format::Argb8888) {
                Ok(buf) => buf,
                Err(e) => {
                    error!("Failed to create buffer {}x{}: {}", width, height, e);
                    return false;
                }
            };

        compose_row(&panels, canvas, width, height);

        // Attach and commit
        let Some(ref window) = self.window else {
            return false;
        };
        let surface = window.wl_surface();
        if let Err(e) = buffer.attach_to(surface) {
            error!("Failed to attach buffer: {:?}", e);
            return false;
        }
        surface.damage_buffer(0, 0, width as i32, height as i32);
        surface.commit();

        self.buffer = Some(buffer);
        true
    }
}

/// Title showing the position in the set and the number of marks
fn window_title(session: &Session) -> String {
    let position = format!("{}/{}", session.index() + 1, session.len());
    match session.mode() {
        Mode::Mark => format!("{APP_ID} - {position} ({} marked)", session.marks().count()),
        Mode::ViewOnly => format!("{APP_ID} - {position}"),
    }
}

/// Key identifier understood by the session's dispatch table
fn key_name(event: &KeyEvent) -> Option<String> {
    if event.keysym == Keysym::Right {
        Some("right".to_string())
    } else if event.keysym == Keysym::Left {
        Some("left".to_string())
    } else if event.keysym == Keysym::Escape {
        Some("escape".to_string())
    } else {
        event.utf8.clone().filter(|text| !text.is_empty())
    }
}

// Implement required traits for smithay-client-toolkit

impl CompositorHandler for WaylandApp {
    fn scale_factor_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_factor: i32,
    ) {
        debug!("Scale factor changed");
    }

    fn transform_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_transform: wl_output::Transform,
    ) {
        debug!("Transform changed");
    }

    fn frame(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _time: u32,
    ) {
        if self.redraw.frame_done() {
            self.draw(qh);
        }
    }

    fn surface_enter(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }

    fn surface_leave(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }
}

impl OutputHandler for WaylandApp {
    fn output_state(&mut self) -> &mut OutputState {
        &mut self.output_state
    }

    fn new_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
        debug!("New output detected");
    }

    fn update_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
        debug!("Output updated");
    }

    fn output_destroyed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
        debug!("Output destroyed");
    }
}

impl WindowHandler for WaylandApp {
    fn request_close(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _window: &Window) {
        info!("Window closed");
        self.closed = true;
    }

    fn configure(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        _window: &Window,
        configure: WindowConfigure,
        _serial: u32,
    ) {
        debug!("Window configured: {:?}", configure);

        // Keep our own size when the compositor leaves the choice to us
        if let Some(width) = configure.new_size.0 {
            self.width = width.get();
        }
        if let Some(height) = configure.new_size.1 {
            self.height = height.get();
        }

        self.configured = true;
        self.redraw.request();
        self.draw(qh);
    }
}

impl SeatHandler for WaylandApp {
    fn seat_state(&mut self) -> &mut SeatState {
        &mut self.seat_state
    }

    fn new_seat(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _seat: wl_seat::WlSeat) {
        debug!("New seat");
    }

    fn new_capability(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        seat: wl_seat::WlSeat,
        capability: Capability,
    ) {
        debug!("New capability: {:?}", capability);

        if capability == Capability::Keyboard {
            if let Err(e) = self.seat_state.get_keyboard(qh, &seat, None) {
                error!("Failed to get keyboard: {}", e);
            }
        }
    }

    fn remove_capability(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _seat: wl_seat::WlSeat,
        _capability: Capability,
    ) {
        debug!("Capability removed");
    }

    fn remove_seat(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _seat: wl_seat::WlSeat) {
        debug!("Seat removed");
    }
}

impl KeyboardHandler for WaylandApp {
    fn enter(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _surface: &wl_surface::WlSurface,
        _serial: u32,
        _raw: &[u32],
        _keysyms: &[Keysym],
    ) {
        debug!("Keyboard entered surface");
    }

    fn leave(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _surface: &wl_surface::WlSurface,
        _serial: u32,
    ) {
        debug!("Keyboard left surface");
    }

    fn press_key(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _serial: u32,
        event: KeyEvent,
    ) {
        debug!("Key pressed: {:?}", event.keysym);

        if let Some(key) = key_name(&event) {
            self.handle_key(&key, qh);
        }
    }

    fn release_key(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _serial: u32,
        _event: KeyEvent,
    ) {
    }

    fn update_modifiers(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _serial: u32,
        _modifiers: Modifiers,
        _layout: u32,
    ) {
    }
}

impl ShmHandler for WaylandApp {
    fn shm_state(&mut self) -> &mut Shm {
        &mut self.shm
    }
}

impl ProvidesRegistryState for WaylandApp {
    fn registry(&mut self) -> &mut RegistryState {
        &mut self.registry_state
    }

    registry_handlers![OutputState, SeatState];
}

// Delegate macros
delegate_compositor!(WaylandApp);
delegate_output!(WaylandApp);
delegate_xdg_shell!(WaylandApp);
delegate_xdg_window!(WaylandApp);
delegate_seat!(WaylandApp);
delegate_keyboard!(WaylandApp);
delegate_shm!(WaylandApp);
delegate_registry!(WaylandApp);

/// Show the image set until the window is closed, then hand back the final session
pub fn run(images: ImageSet, session: Session) -> Result<Session> {
    info!("Connecting to Wayland display");

    // Connect to Wayland display
    let conn = Connection::connect_to_env().context("Failed to connect to Wayland display")?;

    // Initialize registry and event queue
    let (globals, mut event_queue) =
        registry_queue_init(&conn).context("Failed to initialize registry")?;
    let qh = event_queue.handle();

    // Initialize required globals
    let compositor_state =
        CompositorState::bind(&globals, &qh).context("Failed to bind compositor")?;
    let xdg_shell = XdgShell::bind(&globals, &qh).context("Failed to bind xdg shell")?;
    let shm = Shm::bind(&globals, &qh).context("Failed to bind shm")?;

    // Create application state
    let mut app = WaylandApp::new(
        RegistryState::new(&globals),
        SeatState::new(&globals, &qh),
        OutputState::new(&globals, &qh),
        shm,
        xdg_shell,
        compositor_state,
        images,
        session,
    );

    // Dispatch once to get output info
    event_queue.roundtrip(&mut app)?;

    let (display_width, display_height) = get_display_dimensions(&app.output_state);
    info!("Display dimensions: {}x{}", display_width, display_height);

    // Size the window after the first row of images
    let sizes: Vec<(u32, u32)> = app
        .current_images()
        .iter()
        .flatten()
        .map(|img| (img.width, img.height))
        .collect();
    let (row_width, row_height) = natural_row_size(&sizes);
    let (target_width, target_height) = calculate_limited_size(
        row_width,
        row_height,
        display_width,
        display_height,
        MAX_SCREEN_FRACTION,
    );
    info!(
        "Row size: {}x{} -> Window size: {}x{}",
        row_width, row_height, target_width, target_height
    );
    app.width = target_width;
    app.height = target_height;

    // Create the toplevel window
    let surface = app.compositor_state.create_surface(&qh);
    let window = app
        .xdg_shell
        .create_window(surface, WindowDecorations::RequestServer, &qh);
    window.set_title(window_title(&app.session));
    window.set_app_id(APP_ID);
    window.set_min_size(Some((MIN_SIZE, MIN_SIZE)));

    // Commit the surface to trigger configure
    window.commit();

    app.window = Some(window);

    info!("Starting event loop");
    match app.session.mode() {
        Mode::Mark => info!("Controls: Left/Right to browse, 1-9 to mark a column, Esc or q to finish"),
        Mode::ViewOnly => info!("Controls: Left/Right to browse, Esc or q to quit"),
    }

    // Main event loop
    loop {
        event_queue.blocking_dispatch(&mut app)?;

        if app.should_exit() {
            info!("Exiting display loop");
            break;
        }
    }

    Ok(app.session)
}

/// Get display dimensions from the output state
fn get_display_dimensions(output_state: &OutputState) -> (u32, u32) {
    for output in output_state.outputs() {
        if let Some(info) = output_state.info(&output) {
            if let Some(mode) = info.modes.iter().find(|m| m.current) {
                return (mode.dimensions.0 as u32, mode.dimensions.1 as u32);
            }
            if let Some(mode) = info.modes.first() {
                return (mode.dimensions.0 as u32, mode.dimensions.1 as u32);
            }
        }
    }
    (1920, 1080)
}

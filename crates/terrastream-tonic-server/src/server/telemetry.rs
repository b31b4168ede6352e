//! Logging, tracing and metrics setup for the delivery server.
//!
//! Console logging through `tracing_subscriber::fmt` is always on and
//! filtered by `RUST_LOG` (default `info`). OpenTelemetry export is opt-in:
//!
//! - `tracing`: spans around every RPC and worker call.
//! - `metrics`: per-method request and error counters, in-flight calls, call
//!   duration and delivered points.
//! - `stdout`: print spans and metrics to stdout every few seconds.
//! - `otlp`: ship spans and metrics over OTLP/gRPC. Endpoint, headers and
//!   compression come from the standard `OTEL_EXPORTER_OTLP_*` variables.
//!
//! Exporters need `tracing` or `metrics`, and both exporters may be enabled
//! together:
//!
//! ```bash
//! cargo run --features tracing,metrics,otlp
//! cargo run --features tracing,stdout
//! ```
//!
//! Without `metrics` every recording helper below compiles to a no-op.

#[cfg(all(
    any(feature = "otlp", feature = "stdout"),
    not(any(feature = "tracing", feature = "metrics"))
))]
compile_error!("The 'otlp' and 'stdout' exporters need 'tracing' or 'metrics' enabled.");

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "metrics")]
use opentelemetry::metrics::{Counter, Histogram, Meter, UpDownCounter};
#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry::{InstrumentationScope, KeyValue};
#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry_sdk::Resource;
#[cfg(feature = "metrics")]
use opentelemetry_sdk::metrics as sdkmetrics;
#[cfg(feature = "tracing")]
use opentelemetry_sdk::trace as sdktrace;
#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry_semantic_conventions as semvcns;
#[cfg(any(feature = "metrics", feature = "tracing"))]
use std::time::Duration;

#[cfg(any(feature = "metrics", feature = "tracing"))]
const SERVICE_NAME: &str = "terrastream";

/// How often buffered spans and metrics are pushed to an exporter.
#[cfg(any(feature = "metrics", feature = "tracing"))]
const EXPORT_INTERVAL: Duration = Duration::from_secs(5);

/// Installed OpenTelemetry providers, flushed on shutdown.
pub struct TelemetryProviders {
    #[cfg(feature = "tracing")]
    tracer_provider: sdktrace::SdkTracerProvider,
    #[cfg(feature = "metrics")]
    meter_provider: sdkmetrics::SdkMeterProvider,
}

impl TelemetryProviders {
    /// Flushes pending telemetry and stops the exporters.
    ///
    /// Runs after the subscriber may already be gone, so failures go to
    /// stderr.
    pub fn shutdown(self) {
        #[cfg(feature = "tracing")]
        {
            if let Err(err) = self.tracer_provider.force_flush() {
                eprintln!("Error flushing traces: {err:#?}");
            }
            if let Err(err) = self.tracer_provider.shutdown() {
                eprintln!("Error shutting down tracer: {err:#?}");
            }
        }

        #[cfg(feature = "metrics")]
        {
            if let Err(err) = self.meter_provider.force_flush() {
                eprintln!("Error flushing metrics: {err:#?}");
            }
            if let Err(err) = self.meter_provider.shutdown() {
                eprintln!("Error shutting down meter: {err:#?}");
            }
        }
    }
}

/// Installs the global subscriber and any enabled exporters.
///
/// # Errors
///
/// Fails if an OTLP exporter cannot be built from the environment.
pub fn init_telemetry() -> anyhow::Result<TelemetryProviders> {
    #[cfg(feature = "tracing")]
    opentelemetry::global::set_text_map_propagator(
        opentelemetry_sdk::propagation::TraceContextPropagator::new(),
    );

    #[cfg(any(feature = "metrics", feature = "tracing"))]
    let scope = InstrumentationScope::builder(SERVICE_NAME)
        .with_version(env!("CARGO_PKG_VERSION"))
        .with_schema_url(semvcns::SCHEMA_URL)
        .build();

    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true)
                .pretty(),
        );

    #[cfg(feature = "tracing")]
    let tracer_provider = init_tracer()?;
    #[cfg(feature = "tracing")]
    let registry = {
        use opentelemetry::trace::TracerProvider;

        opentelemetry::global::set_tracer_provider(tracer_provider.clone());
        registry.with(
            tracing_opentelemetry::layer()
                .with_tracer(tracer_provider.tracer_with_scope(scope.clone()))
                .with_error_records_to_exceptions(true),
        )
    };

    #[cfg(feature = "metrics")]
    let meter_provider = init_metrics()?;
    #[cfg(feature = "metrics")]
    let registry = {
        opentelemetry::global::set_meter_provider(meter_provider.clone());
        Instruments::install(opentelemetry::global::meter_with_scope(scope));
        registry.with(tracing_opentelemetry::MetricsLayer::new(meter_provider.clone()))
    };

    registry.init();

    Ok(TelemetryProviders {
        #[cfg(feature = "tracing")]
        tracer_provider,
        #[cfg(feature = "metrics")]
        meter_provider,
    })
}

#[cfg(any(feature = "metrics", feature = "tracing"))]
fn resource() -> Resource {
    Resource::builder()
        .with_service_name(SERVICE_NAME)
        .with_schema_url(
            [KeyValue::new(
                semvcns::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            )],
            semvcns::SCHEMA_URL,
        )
        .build()
}

#[cfg(feature = "tracing")]
fn batched<E>(exporter: E) -> sdktrace::BatchSpanProcessor
where
    E: opentelemetry_sdk::trace::SpanExporter + 'static,
{
    sdktrace::BatchSpanProcessor::builder(exporter)
        .with_batch_config(
            sdktrace::BatchConfigBuilder::default()
                .with_scheduled_delay(EXPORT_INTERVAL)
                .with_max_queue_size(2048)
                .build(),
        )
        .build()
}

#[cfg(feature = "tracing")]
fn init_tracer() -> anyhow::Result<sdktrace::SdkTracerProvider> {
    let builder = sdktrace::SdkTracerProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = builder.with_span_processor(batched(opentelemetry_stdout::SpanExporter::default()));

    #[cfg(feature = "otlp")]
    let builder = {
        use anyhow::Context;
        use opentelemetry_otlp::WithExportConfig;

        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_protocol(opentelemetry_otlp::Protocol::Grpc)
            .build()
            .context("failed to build OTLP span exporter")?;
        builder.with_span_processor(batched(exporter))
    };

    Ok(builder.build())
}

#[cfg(feature = "metrics")]
fn periodic<E>(exporter: E) -> sdkmetrics::PeriodicReader<E>
where
    E: opentelemetry_sdk::metrics::exporter::PushMetricExporter,
{
    sdkmetrics::PeriodicReader::builder(exporter)
        .with_interval(EXPORT_INTERVAL)
        .build()
}

#[cfg(feature = "metrics")]
fn init_metrics() -> anyhow::Result<sdkmetrics::SdkMeterProvider> {
    let builder = sdkmetrics::SdkMeterProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = builder.with_reader(periodic(opentelemetry_stdout::MetricExporter::default()));

    #[cfg(feature = "otlp")]
    let builder = {
        use anyhow::Context;
        use opentelemetry_otlp::WithExportConfig;

        let exporter = opentelemetry_otlp::MetricExporter::builder()
            .with_tonic()
            .with_protocol(opentelemetry_otlp::Protocol::Grpc)
            .build()
            .context("failed to build OTLP metric exporter")?;
        builder.with_reader(periodic(exporter))
    };

    Ok(builder.build())
}

#[cfg(feature = "metrics")]
struct Instruments {
    requests: Counter<u64>,
    calls_inflight: UpDownCounter<i64>,
    errors: Counter<u64>,
    call_duration_ms: Histogram<f64>,
    points_delivered: Counter<u64>,
    points_per_request: Histogram<f64>,
}

#[cfg(feature = "metrics")]
static INSTRUMENTS: std::sync::OnceLock<Instruments> = std::sync::OnceLock::new();

#[cfg(feature = "metrics")]
impl Instruments {
    fn install(meter: Meter) {
        let _ = INSTRUMENTS.set(Self {
            requests: meter
                .u64_counter("requests")
                .with_description("gRPC requests accepted, by method")
                .build(),
            calls_inflight: meter
                .i64_up_down_counter("calls_inflight")
                .with_description("Calls queued or running on the worker pool")
                .build(),
            errors: meter
                .u64_counter("errors")
                .with_description("Rejected, failed or cancelled calls, by method")
                .build(),
            call_duration_ms: meter
                .f64_histogram("call_duration")
                .with_unit("ms")
                .with_description("Time a worker spent serving one call")
                .build(),
            points_delivered: meter
                .u64_counter("points_delivered")
                .with_description("Points handed to the transport")
                .build(),
            points_per_request: meter
                .f64_histogram("points_per_request")
                .with_description("Points requested per batch call")
                .build(),
        });
    }

    fn with(f: impl FnOnce(&Self)) {
        if let Some(instruments) = INSTRUMENTS.get() {
            f(instruments);
        }
    }
}

#[cfg(feature = "metrics")]
fn method_attr(method: &'static str) -> [KeyValue; 1] {
    [KeyValue::new("rpc.method", method)]
}

#[cfg(feature = "metrics")]
pub fn increment_requests(method: &'static str) {
    Instruments::with(|i| i.requests.add(1, &method_attr(method)));
}

#[cfg(not(feature = "metrics"))]
pub fn increment_requests(_method: &'static str) {}

#[cfg(feature = "metrics")]
pub fn increment_calls_inflight() {
    Instruments::with(|i| i.calls_inflight.add(1, &[]));
}

#[cfg(not(feature = "metrics"))]
pub fn increment_calls_inflight() {}

#[cfg(feature = "metrics")]
pub fn decrement_calls_inflight() {
    Instruments::with(|i| i.calls_inflight.add(-1, &[]));
}

#[cfg(not(feature = "metrics"))]
pub fn decrement_calls_inflight() {}

#[cfg(feature = "metrics")]
pub fn increment_errors(method: &'static str) {
    Instruments::with(|i| i.errors.add(1, &method_attr(method)));
}

#[cfg(not(feature = "metrics"))]
pub fn increment_errors(_method: &'static str) {}

#[cfg(feature = "metrics")]
pub fn record_call_duration(duration_ms: f64) {
    Instruments::with(|i| i.call_duration_ms.record(duration_ms, &[]));
}

#[cfg(not(feature = "metrics"))]
pub fn record_call_duration(_duration_ms: f64) {}

#[cfg(feature = "metrics")]
pub fn increment_points_delivered(count: u64) {
    Instruments::with(|i| i.points_delivered.add(count, &[]));
}

#[cfg(not(feature = "metrics"))]
pub fn increment_points_delivered(_count: u64) {}

#[cfg(feature = "metrics")]
pub fn record_points_per_request(count: f64) {
    Instruments::with(|i| i.points_per_request.record(count, &[]));
}

#[cfg(not(feature = "metrics"))]
pub fn record_points_per_request(_count: f64) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_before_init_is_a_no_op() {
        increment_requests("GetBatchData");
        increment_calls_inflight();
        decrement_calls_inflight();
        increment_errors("GetBatchData");
        record_call_duration(1.5);
        increment_points_delivered(10);
        record_points_per_request(10.0);
    }
}

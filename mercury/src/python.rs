//! Python classes for the peripherals, matching the property style of the notebook drivers

use crate::{
    peripherals::{
        self,
        acquire::Acquisition,
        generate::Generator,
    },
    transport::{
        self,
        local::Local,
    },
};
use pyo3::{
    exceptions::{
        PyIOError,
        PyValueError,
    },
    prelude::*,
};

impl From<transport::Error> for PyErr {
    fn from(e: transport::Error) -> Self {
        PyIOError::new_err(e.to_string())
    }
}

impl From<peripherals::Error> for PyErr {
    fn from(e: peripherals::Error) -> Self {
        match e {
            peripherals::Error::Transport(e) => e.into(),
            e @ (peripherals::Error::Range(_) | peripherals::Error::InvalidArgument(_)) => {
                PyValueError::new_err(e.to_string())
            }
        }
    }
}

#[pyclass(name = "acq")]
struct PyAcquisition(Acquisition<Local>);

#[pymethods]
impl PyAcquisition {
    #[new]
    fn new(index: u32, input_range: f64) -> PyResult<Self> {
        Ok(Self(Acquisition::open(index, input_range)?))
    }

    fn reset(&self) -> PyResult<()> {
        Ok(self.0.control.reset()?)
    }

    fn start(&self) -> PyResult<()> {
        Ok(self.0.control.start()?)
    }

    fn stop(&self) -> PyResult<()> {
        Ok(self.0.control.stop()?)
    }

    fn trigger(&self) -> PyResult<()> {
        Ok(self.0.control.software_trigger()?)
    }

    fn status(&self) -> PyResult<u32> {
        Ok(self.0.control.status()?)
    }

    #[allow(clippy::too_many_arguments)]
    fn set_trigger(
        &self,
        edge: &str,
        level: f64,
        hysteresis: f64,
        pre_delay: u32,
        post_delay: u32,
        mask: u32,
    ) -> PyResult<()> {
        Ok(self
            .0
            .set_trigger(edge, level, hysteresis, pre_delay, post_delay, mask)?)
    }

    fn show_regset(&self) -> PyResult<Vec<(&'static str, u32)>> {
        Ok(self.0.dump()?)
    }

    fn data(&self) -> PyResult<Vec<f64>> {
        Ok(self.0.read_samples()?)
    }

    #[getter]
    fn input_range(&self) -> f64 {
        self.0.input_range()
    }

    #[setter]
    fn set_input_range(&mut self, volts: f64) -> PyResult<()> {
        Ok(self.0.set_input_range(volts)?)
    }

    #[getter]
    fn filter_coefficients(&self) -> PyResult<(u32, u32, u32, u32)> {
        let c = self.0.filter_coefficients()?;
        Ok((c.aa, c.bb, c.kk, c.pp))
    }

    #[getter]
    fn trigger_mask(&self) -> PyResult<u32> {
        Ok(self.0.trigger_mask()?)
    }

    #[setter]
    fn set_trigger_mask(&self, mask: u32) -> PyResult<()> {
        Ok(self.0.set_trigger_mask(mask)?)
    }

    #[getter]
    fn continuous(&self) -> PyResult<bool> {
        Ok(self.0.continuous()?)
    }

    #[setter]
    fn set_continuous(&self, enabled: bool) -> PyResult<()> {
        Ok(self.0.set_continuous(enabled)?)
    }

    #[getter]
    fn automatic(&self) -> PyResult<bool> {
        Ok(self.0.automatic()?)
    }

    #[setter]
    fn set_automatic(&self, enabled: bool) -> PyResult<()> {
        Ok(self.0.set_automatic(enabled)?)
    }

    #[getter]
    fn trigger_pre_delay(&self) -> PyResult<u32> {
        Ok(self.0.trigger_pre_delay()?)
    }

    #[setter]
    fn set_trigger_pre_delay(&self, samples: u32) -> PyResult<()> {
        Ok(self.0.set_trigger_pre_delay(samples)?)
    }

    #[getter]
    fn trigger_post_delay(&self) -> PyResult<u32> {
        Ok(self.0.trigger_post_delay()?)
    }

    #[setter]
    fn set_trigger_post_delay(&self, samples: u32) -> PyResult<()> {
        Ok(self.0.set_trigger_post_delay(samples)?)
    }

    #[getter]
    fn trigger_pre_status(&self) -> PyResult<u32> {
        Ok(self.0.trigger_pre_status()?)
    }

    #[getter]
    fn trigger_post_status(&self) -> PyResult<u32> {
        Ok(self.0.trigger_post_status()?)
    }

    #[getter]
    fn level(&self) -> PyResult<f64> {
        Ok(self.0.level()?)
    }

    #[setter]
    fn set_level(&self, volts: f64) -> PyResult<()> {
        Ok(self.0.set_level(volts)?)
    }

    #[getter]
    fn hysteresis(&self) -> PyResult<f64> {
        Ok(self.0.hysteresis()?)
    }

    #[setter]
    fn set_hysteresis(&self, volts: f64) -> PyResult<()> {
        Ok(self.0.set_hysteresis(volts)?)
    }

    #[getter]
    fn edge(&self) -> PyResult<String> {
        Ok(self.0.edge()?.to_string())
    }

    #[setter]
    fn set_edge(&self, edge: &str) -> PyResult<()> {
        Ok(self.0.set_edge(edge)?)
    }

    #[getter]
    fn decimation(&self) -> PyResult<u32> {
        Ok(self.0.decimation()?)
    }

    #[setter]
    fn set_decimation(&self, factor: u32) -> PyResult<()> {
        Ok(self.0.set_decimation(factor)?)
    }

    #[getter]
    fn average(&self) -> PyResult<bool> {
        Ok(self.0.average()?)
    }

    #[setter]
    fn set_average(&self, enabled: bool) -> PyResult<()> {
        Ok(self.0.set_average(enabled)?)
    }

    #[getter]
    fn filter_bypass(&self) -> PyResult<bool> {
        Ok(self.0.filter_bypass()?)
    }

    #[setter]
    fn set_filter_bypass(&self, bypass: bool) -> PyResult<()> {
        Ok(self.0.set_filter_bypass(bypass)?)
    }
}

#[pyclass(name = "asg")]
struct PyGenerator(Generator<Local>);

#[pymethods]
impl PyGenerator {
    #[new]
    fn new(index: u32) -> PyResult<Self> {
        Ok(Self(Generator::open(index)?))
    }

    fn reset(&self) -> PyResult<()> {
        Ok(self.0.control.reset()?)
    }

    fn start(&self) -> PyResult<()> {
        Ok(self.0.control.start()?)
    }

    fn stop(&self) -> PyResult<()> {
        Ok(self.0.control.stop()?)
    }

    fn trigger(&self) -> PyResult<()> {
        Ok(self.0.control.software_trigger()?)
    }

    fn status(&self) -> PyResult<u32> {
        Ok(self.0.control.status()?)
    }

    fn show_regset(&self) -> PyResult<Vec<(&'static str, u32)>> {
        Ok(self.0.dump()?)
    }

    fn burst_status(&self) -> PyResult<(u32, u32)> {
        let status = self.0.burst_status()?;
        Ok((status.position, status.count))
    }

    #[getter]
    fn amplitude(&self) -> PyResult<f64> {
        Ok(self.0.amplitude()?)
    }

    #[setter]
    fn set_amplitude(&self, gain: f64) -> PyResult<()> {
        Ok(self.0.set_amplitude(gain)?)
    }

    #[getter]
    fn offset(&self) -> PyResult<f64> {
        Ok(self.0.offset()?)
    }

    #[setter]
    fn set_offset(&self, offset: f64) -> PyResult<()> {
        Ok(self.0.set_offset(offset)?)
    }

    #[getter]
    fn frequency(&self) -> PyResult<f64> {
        Ok(self.0.frequency()?)
    }

    #[setter]
    fn set_frequency(&self, hz: f64) -> PyResult<()> {
        Ok(self.0.set_frequency(hz)?)
    }

    #[getter]
    fn phase(&self) -> PyResult<f64> {
        Ok(self.0.phase()?)
    }

    #[setter]
    fn set_phase(&self, degrees: f64) -> PyResult<()> {
        Ok(self.0.set_phase(degrees)?)
    }

    #[getter]
    fn waveform(&self) -> PyResult<Vec<f64>> {
        Ok(self.0.waveform()?)
    }

    #[setter]
    fn set_waveform(&self, samples: Vec<f64>) -> PyResult<()> {
        Ok(self.0.set_waveform(&samples)?)
    }

    #[getter]
    fn trigger_mask(&self) -> PyResult<u32> {
        Ok(self.0.trigger_mask()?)
    }

    #[setter]
    fn set_trigger_mask(&self, mask: u32) -> PyResult<()> {
        Ok(self.0.set_trigger_mask(mask)?)
    }

    #[getter]
    fn mode(&self) -> PyResult<String> {
        Ok(self.0.burst_mode()?.to_string())
    }

    #[setter]
    fn set_mode(&self, mode: &str) -> PyResult<()> {
        Ok(self.0.set_burst_mode(mode)?)
    }

    #[getter]
    fn burst_data_len(&self) -> PyResult<u32> {
        Ok(self.0.burst_data_len()?)
    }

    #[setter]
    fn set_burst_data_len(&self, len: u32) -> PyResult<()> {
        Ok(self.0.set_burst_data_len(len)?)
    }

    #[getter]
    fn burst_period_len(&self) -> PyResult<u32> {
        Ok(self.0.burst_period_len()?)
    }

    #[setter]
    fn set_burst_period_len(&self, len: u32) -> PyResult<()> {
        Ok(self.0.set_burst_period_len(len)?)
    }

    #[getter]
    fn burst_repetitions(&self) -> PyResult<u32> {
        Ok(self.0.burst_repetitions()?)
    }

    #[setter]
    fn set_burst_repetitions(&self, count: u32) -> PyResult<()> {
        Ok(self.0.set_burst_repetitions(count)?)
    }
}

#[pymodule]
fn mercury(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyAcquisition>()?;
    m.add_class::<PyGenerator>()?;
    Ok(())
}
